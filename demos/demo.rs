use std::sync::Arc;

use messenger::{
    messages::PropertyChangedMessage, Messenger, MessengerExt, Recipient,
    StrongReferenceMessenger, Subscriber,
};

#[derive(Debug)]
struct LoggedIn(String);

#[derive(Debug)]
struct LoggedOut;

#[derive(Subscriber)]
#[receives(LoggedIn, LoggedOut)]
struct Sidebar;

impl Recipient<LoggedIn> for Sidebar {
    fn receive(&self, msg: &mut LoggedIn) {
        println!("Sidebar: welcome {}", msg.0);
    }
}

impl Recipient<LoggedOut> for Sidebar {
    fn receive(&self, _: &mut LoggedOut) {
        println!("Sidebar: bye");
    }
}

struct StatusBar {
    prefix: &'static str,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let messenger = StrongReferenceMessenger::new();

    let sidebar = Arc::new(Sidebar);
    let status = Arc::new(StatusBar { prefix: "[status]" });

    messenger.register_all_default(&sidebar)?;
    messenger.register_default(&status, |r: &StatusBar, msg: &mut LoggedIn| {
        println!("{} {} is online", r.prefix, msg.0);
    })?;
    messenger.register(
        &status,
        "settings",
        |r: &StatusBar, msg: &mut PropertyChangedMessage<bool>| {
            println!(
                "{} {} changed {} -> {}",
                r.prefix, msg.property_name, msg.old_value, msg.new_value
            );
        },
    )?;

    messenger.send_default(LoggedIn("ada".into()));
    messenger.send(PropertyChangedMessage::new("dark_mode", false, true), "settings");

    messenger.unregister_all(&status);
    messenger.send_default(LoggedIn("grace".into()));
    messenger.send_default(LoggedOut);

    println!(
        "channels: {}, recipients: {}",
        messenger.channel_count(),
        messenger.recipient_count()
    );

    messenger.reset();

    Ok(())
}
