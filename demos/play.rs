//! Play a stream and print what arrives
//!
//! Run with: cargo run --example play -- rtmp://localhost/live/test_key [license]

use rtmp_session::client::{ClientConfig, SessionEvent, SessionManager, StaticLicense};
use rtmp_session::media::CodecConfig;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("rtmp_session=debug".parse()?)
                .add_directive("play=info".parse()?),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let url = args.next().unwrap_or_else(|| {
        eprintln!("Usage: play <rtmp_url> [license]");
        eprintln!("Example: play rtmp://localhost/live/test_key");
        std::process::exit(1);
    });
    let license = args.next().unwrap_or_else(|| "demo".to_string());

    println!("Connecting to {}", url);
    let config = ClientConfig::play(&url).license(StaticLicense::new(license));
    let session = SessionManager::connect(config).await?;
    session.start_play()?;

    let mut video_frames = 0u64;
    let mut audio_frames = 0u64;
    let mut keyframes = 0u64;

    loop {
        let event = tokio::select! {
            event = session.next_event() => event,
            _ = tokio::signal::ctrl_c() => {
                session.stop().await?;
                continue;
            }
        };
        let Some(event) = event else {
            break;
        };

        match event {
            SessionEvent::StateChanged(state) => println!("State: {:?}", state),
            SessionEvent::CodecConfigured(CodecConfig::Video(avc)) => {
                println!("Video: H.264 {} level {}", avc.profile_name(), avc.level_string());
            }
            SessionEvent::CodecConfigured(CodecConfig::Hevc(hevc)) => {
                println!("Video: H.265 {} level {}", hevc.profile_name(), hevc.level_string());
            }
            SessionEvent::CodecConfigured(CodecConfig::Audio(aac)) => {
                println!("Audio: AAC {} Hz, {} channels", aac.sampling_frequency, aac.channels());
            }
            SessionEvent::Metadata(metadata) => {
                if let Some(width) = metadata.get("width") {
                    println!("  Width: {:?}", width);
                }
                if let Some(height) = metadata.get("height") {
                    println!("  Height: {:?}", height);
                }
            }
            SessionEvent::FrameReceived(frame) => {
                if frame.is_video() {
                    video_frames += 1;
                    if frame.keyframe {
                        keyframes += 1;
                        println!("  Keyframe at {}", frame.timestamp);
                    }
                } else {
                    audio_frames += 1;
                }
            }
            SessionEvent::Stats(stats) => {
                println!("Bitrate: {} kbps, dropped {}", stats.bitrate / 1000, stats.dropped_frames);
            }
            SessionEvent::StreamEnded => println!("Stream ended"),
            SessionEvent::Stalled { unacknowledged } => println!("Stalled: {} bytes unacknowledged", unacknowledged),
            SessionEvent::Error { kind, message, .. } => eprintln!("Error ({}): {}", kind, message),
            SessionEvent::SessionClosed(reason) => println!("Closed: {:?}", reason),
        }
    }

    println!(
        "Final stats: {} video, {} audio, {} keyframes",
        video_frames, audio_frames, keyframes
    );
    Ok(())
}
