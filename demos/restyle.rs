//! Restyle a portrait with a catalog style.
//!
//! Run with: `cargo run --example restyle -- <photo.jpg> [style-id]`
//!
//! Requires `GEMINI_API_KEY` or `GOOGLE_API_KEY` environment variable.

use stylize::{GeminiProvider, SelectedFile, Studio, StudioOptions};

#[tokio::main]
async fn main() -> stylize::Result<()> {
    let mut args = std::env::args().skip(1);
    let Some(input_path) = args.next() else {
        eprintln!("Usage: restyle <photo.jpg> [style-id]");
        std::process::exit(2);
    };
    let style = args.next().unwrap_or_else(|| "oil-painting".to_string());

    let provider = GeminiProvider::builder().build()?;
    let mut studio = Studio::new(None, StudioOptions::default());
    studio.start().await;

    studio.upload(&SelectedFile::from_path(&input_path)).await?;
    studio.select_style(&style)?;
    studio.generate(&provider).await?;

    if let Some(image) = studio.state().generated() {
        let output = format!("restyled.{}", image.extension().unwrap_or("png"));
        image.save(&output).await?;
        println!("Restyled image saved to {output} ({} bytes)", image.approx_size());
    }

    Ok(())
}
