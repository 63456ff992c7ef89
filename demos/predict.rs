//! Tag an image with the public General model.
//!
//! ```text
//! CLARIFAI_CLIENT_ID=... CLARIFAI_CLIENT_SECRET=... cargo run --example predict -- <image-url-or-path>
//! ```

use std::env;

use clarifai::{Config, ImageClient, ImageSource};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let client_id = env::var("CLARIFAI_CLIENT_ID")?;
    let client_secret = env::var("CLARIFAI_CLIENT_SECRET")?;
    let target = env::args()
        .nth(1)
        .unwrap_or_else(|| "https://samples.clarifai.com/metro-north.jpg".to_string());

    let image = if ImageSource::from(target.as_str()).is_url() {
        ImageSource::Url(target)
    } else {
        ImageSource::Bytes(std::fs::read(&target)?)
    };

    let mut session = ImageClient::new(Config::new(client_id, client_secret))?;
    session.add_image(image);
    let resp = session.predict("General")?;

    let concepts = resp["outputs"][0]["data"]["concepts"]
        .as_array()
        .cloned()
        .unwrap_or_default();
    for concept in concepts {
        println!(
            "{:<20} {:.3}",
            concept["name"].as_str().unwrap_or("?"),
            concept["value"].as_f64().unwrap_or_default()
        );
    }
    Ok(())
}
