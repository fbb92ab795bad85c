use futures::StreamExt;
use inotify_watch::{Flags, Watcher};
use log::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();

    // Path to watch and number of events before shutdown
    let mut args = std::env::args().skip(1);
    let path = args.next().unwrap_or_else(|| ".".to_string());
    let max_events: usize = match args.next() {
        Some(count) => count.parse()?,
        None => 10,
    };

    let mut watcher = Watcher::new();
    watcher.watch(&path, Flags::MODIFY | Flags::CREATE | Flags::DELETE)?;
    watcher.open()?;
    info!("watching {} for {} events", path, max_events);

    let mut events = (&mut watcher).take(max_events);
    loop {
        tokio::select! {
            event = events.next() => match event {
                Some(event) => {
                    let event = event?;
                    println!("{:?} {}", event.name, event.flags);
                }
                None => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    watcher.close();
    Ok(())
}
