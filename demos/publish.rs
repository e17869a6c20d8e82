//! Publish a synthetic H.264 + AAC stream
//!
//! Run with: cargo run --example publish -- rtmp://localhost/live/test_key [license]
//!
//! Frames carry placeholder payloads, so a player will not render them; the
//! point is to exercise the session against a real server.

use std::time::Duration;

use bytes::Bytes;
use rtmp_session::amf::AmfObject;
use rtmp_session::client::{ClientConfig, Publisher, StaticLicense};
use rtmp_session::media::{AudioSpecificConfig, MediaFrame, SequenceHeader};
use rtmp_session::SessionState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("rtmp_session=debug".parse()?)
                .add_directive("publish=info".parse()?),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let url = args.next().unwrap_or_else(|| {
        eprintln!("Usage: publish <rtmp_url> [license]");
        eprintln!("Example: publish rtmp://localhost/live/test_key");
        std::process::exit(1);
    });
    let license = args.next().unwrap_or_else(|| "demo".to_string());

    let metadata = AmfObject::new()
        .with("width", 1280.0)
        .with("height", 720.0)
        .with("framerate", 30.0)
        .with("videocodecid", 7.0)
        .with("audiocodecid", 10.0)
        .with("audiosamplerate", 44100.0)
        .with("audiochannels", 2.0);
    let config = ClientConfig::publish(&url)
        .metadata(metadata)
        .chunk_size(4096)
        .license(StaticLicense::new(license));

    println!("Publishing to {}", url);
    let publisher = Publisher::start(config).await?;

    let sps = Bytes::from_static(&[0x67, 0x64, 0x00, 0x1F, 0xAC, 0xD9, 0x40]);
    let pps = Bytes::from_static(&[0x68, 0xEF, 0x3C, 0xB0]);
    publisher.set_sequence_header(SequenceHeader::from_parameter_sets(sps, pps)?)?;
    publisher.set_sequence_header(SequenceHeader::aac(&AudioSpecificConfig::new(2, 44100, 2)?))?;

    let mut state = publisher.subscribe_state();
    while *state.borrow() != SessionState::Publishing {
        if state.changed().await.is_err() || !state.borrow().is_active() {
            eprintln!("Session ended before publishing");
            return Ok(());
        }
    }

    let mut ticker = tokio::time::interval(Duration::from_millis(33));
    for i in 0..300u32 {
        ticker.tick().await;
        let timestamp = i * 33;
        let keyframe = i % 60 == 0;
        let nal_type = if keyframe { 0x65 } else { 0x41 };
        let frame = MediaFrame::h264(timestamp, keyframe, Bytes::from(vec![0, 0, 0, 4, nal_type, 0x88, 0x84, 0x00]));
        if let Err(e) = publisher.on_encoded_frame(frame) {
            eprintln!("Frame refused: {}", e);
            break;
        }
        let _ = publisher.on_encoded_frame(MediaFrame::aac(timestamp, Bytes::from_static(&[0x21, 0x00, 0x49])));

        while let Some(event) = publisher.try_next_event() {
            println!("{:?}", event);
        }
    }

    publisher.stop().await?;
    while let Some((event, status)) = publisher.next_status().await {
        match status {
            Some(status) => println!("{} {}: {:?}", status.code(), status.description(), event),
            None => println!("{:?}", event),
        }
    }

    let stats = publisher.stats();
    println!(
        "Sent {} bytes, {} video frames, {} dropped",
        stats.bytes_sent, stats.video_frames, stats.dropped_frames
    );
    Ok(())
}
