use std::sync::Arc;

use messenger::{Messenger, MessengerConfig, WeakReferenceMessenger};

#[derive(Debug)]
struct Tick(u32);

struct View {
    name: String,
}

impl Drop for View {
    fn drop(&mut self) {
        println!("{} dropped", self.name);
    }
}

fn on_tick(view: &View, tick: &mut Tick) {
    println!("{} got tick {}", view.name, tick.0);
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config = MessengerConfig::default().with_auto_cleanup_interval(4);
    let messenger = WeakReferenceMessenger::with_config(config);

    let views: Vec<_> = (0..3)
        .map(|i| Arc::new(View { name: format!("view-{}", i) }))
        .collect();

    for (i, view) in views.iter().enumerate() {
        messenger.register(view, i as u32 % 2, on_tick)?;
    }

    messenger.send(Tick(1), 0u32);
    messenger.send(Tick(1), 1u32);

    // nobody unregisters; the messenger only holds weak handles
    drop(views);

    messenger.send(Tick(2), 0u32);
    println!("channels before cleanup: {}", messenger.channel_count());

    messenger.cleanup();
    println!("channels after cleanup: {}", messenger.channel_count());

    Ok(())
}
