use std::time::Duration;

use clap::{Parser, Subcommand};
use serde_json::json;
use uuid::Uuid;

#[derive(Parser)]
#[command(
    name = "maieutic",
    version,
    about = "Maieutic CLI — drive Socratic tutoring sessions from the terminal"
)]
struct Cli {
    /// API base URL
    #[arg(long, env = "MAIEUTIC_API_URL", default_value = "http://localhost:3000")]
    api_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check API health
    Health,
    /// Create a room bound to one problem statement
    Create {
        /// The full problem text students will reason about
        #[arg(long)]
        problem: String,
        /// Moderator name
        #[arg(long)]
        owner: String,
    },
    /// Join a room as a student
    Join {
        /// Shareable room code
        room_code: String,
        /// Student display name
        #[arg(long)]
        name: String,
    },
    /// Send one student turn and print the oracle's reply
    Chat {
        /// Student session ID (from `join`)
        #[arg(long)]
        student: Uuid,
        /// The message to send
        message: String,
        /// Report the message as pasted rather than typed
        #[arg(long)]
        pasted: bool,
        /// Seconds the student took to respond
        #[arg(long)]
        response_time: Option<f64>,
    },
    /// Compute the final score and complete the session
    Score {
        /// Student session ID
        #[arg(long)]
        student: Uuid,
    },
    /// Poll the monitor view of a room
    Watch {
        /// Shareable room code
        room_code: String,
        /// Polling interval in seconds
        #[arg(long, default_value_t = 5)]
        interval: u64,
    },
}

fn client() -> reqwest::Client {
    reqwest::Client::new()
}

fn exit_error(message: &str, docs_hint: Option<&str>) -> ! {
    let mut err = json!({
        "error": "cli_error",
        "message": message
    });
    if let Some(hint) = docs_hint {
        err["docs_hint"] = json!(hint);
    }
    eprintln!("{}", serde_json::to_string_pretty(&err).unwrap());
    std::process::exit(1);
}

async fn print_response(response: reqwest::Response) {
    let status = response.status();
    let body: serde_json::Value = match response.json().await {
        Ok(body) => body,
        Err(err) => exit_error(&format!("failed to read response: {err}"), None),
    };
    println!("{}", serde_json::to_string_pretty(&body).unwrap());
    if !status.is_success() {
        std::process::exit(1);
    }
}

async fn health(api_url: &str) {
    match client().get(format!("{api_url}/health")).send().await {
        Ok(response) => print_response(response).await,
        Err(err) => exit_error(&format!("request failed: {err}"), None),
    }
}

async fn create(api_url: &str, problem: &str, owner: &str) {
    let body = json!({ "problem_text": problem, "owner_name": owner });
    match client()
        .post(format!("{api_url}/v1/rooms"))
        .json(&body)
        .send()
        .await
    {
        Ok(response) => print_response(response).await,
        Err(err) => exit_error(&format!("request failed: {err}"), None),
    }
}

async fn join(api_url: &str, room_code: &str, name: &str) {
    let body = json!({ "student_name": name });
    match client()
        .post(format!("{api_url}/v1/rooms/{room_code}/join"))
        .json(&body)
        .send()
        .await
    {
        Ok(response) => print_response(response).await,
        Err(err) => exit_error(&format!("request failed: {err}"), None),
    }
}

async fn chat(
    api_url: &str,
    student: Uuid,
    message: &str,
    pasted: bool,
    response_time: Option<f64>,
) {
    let mut body = json!({ "message": message });
    if pasted {
        body["input_method"] = json!("pasted");
    }
    if let Some(seconds) = response_time {
        body["response_time_seconds"] = json!(seconds);
    }
    match client()
        .post(format!("{api_url}/v1/students/{student}/turns"))
        .json(&body)
        .send()
        .await
    {
        Ok(response) => print_response(response).await,
        Err(err) => exit_error(&format!("request failed: {err}"), None),
    }
}

async fn score(api_url: &str, student: Uuid) {
    match client()
        .post(format!("{api_url}/v1/students/{student}/score"))
        .send()
        .await
    {
        Ok(response) => print_response(response).await,
        Err(err) => exit_error(&format!("request failed: {err}"), None),
    }
}

async fn watch(api_url: &str, room_code: &str, interval: u64) {
    loop {
        match client()
            .get(format!("{api_url}/v1/rooms/{room_code}/monitor"))
            .send()
            .await
        {
            Ok(response) => {
                let status = response.status();
                match response.json::<serde_json::Value>().await {
                    Ok(body) => {
                        println!("{}", serde_json::to_string_pretty(&body).unwrap());
                        if !status.is_success() {
                            std::process::exit(1);
                        }
                    }
                    Err(err) => exit_error(&format!("failed to read response: {err}"), None),
                }
            }
            Err(err) => eprintln!("poll failed: {err}"),
        }
        tokio::time::sleep(Duration::from_secs(interval)).await;
    }
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    match cli.command {
        Commands::Health => health(&cli.api_url).await,
        Commands::Create { problem, owner } => create(&cli.api_url, &problem, &owner).await,
        Commands::Join { room_code, name } => join(&cli.api_url, &room_code, &name).await,
        Commands::Chat {
            student,
            message,
            pasted,
            response_time,
        } => chat(&cli.api_url, student, &message, pasted, response_time).await,
        Commands::Score { student } => score(&cli.api_url, student).await,
        Commands::Watch {
            room_code,
            interval,
        } => watch(&cli.api_url, &room_code, interval).await,
    }
}
