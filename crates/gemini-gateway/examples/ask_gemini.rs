//! Send one prompt to Gemini, optionally streaming the answer.
//!
//! Run with: cargo run -p gemini-gateway --example ask_gemini -- "Your prompt here"
//! Stream with: cargo run -p gemini-gateway --example ask_gemini -- --stream "Your prompt"
//!
//! Make sure to set environment variables in .env:
//!   GOOGLE_GENAI_API_KEY - Gemini API key

use std::env;
use std::io::Write;

use futures::StreamExt;
use gemini_gateway::{Gateway, GeminiGateway, GenerateRequest};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt::init();

    let mut args: Vec<String> = env::args().skip(1).collect();
    let stream = args.first().map(|a| a == "--stream").unwrap_or(false);
    if stream {
        args.remove(0);
    }
    let prompt = if args.is_empty() {
        "Introduce yourself in one sentence.".to_string()
    } else {
        args.join(" ")
    };

    let gateway = GeminiGateway::from_env()?;
    println!("Gateway: {} (model {})", gateway.name(), gateway.config().model);
    println!("Sending: \"{}\"\n", prompt);

    let request = GenerateRequest::new(prompt)?;

    if stream {
        let mut fragments = gateway.generate_stream(request).await?;
        while let Some(fragment) = fragments.next().await {
            print!("{}", fragment?);
            std::io::stdout().flush()?;
        }
        println!();
    } else {
        let text = gateway.generate(request).await?;
        println!("=== Response ===");
        println!("{}", text);
        println!("================");
    }

    Ok(())
}
