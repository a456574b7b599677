use std::sync::Arc;

use messenger::{
    messages::{AsyncRequestMessage, CollectionRequestMessage, ResponseSlot},
    Error, MessengerExt, Request, StrongReferenceMessenger,
};

#[derive(Debug)]
struct Sum {
    a: i32,
    b: i32,
    response: ResponseSlot<i32>,
}

impl Request for Sum {
    type Response = i32;

    fn into_response(self) -> Option<i32> {
        self.response.into_inner()
    }
}

struct Calculator;

struct Plugin(&'static str);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let messenger = StrongReferenceMessenger::new();

    let unanswered = messenger.request_default(Sum {
        a: 1,
        b: 2,
        response: ResponseSlot::new(),
    });
    assert!(matches!(unanswered, Err(Error::NoResponseReceived { .. })));
    println!("before registration: {:?}", unanswered);

    let calc = Arc::new(Calculator);
    messenger.register_default(&calc, |_: &Calculator, req: &mut Sum| {
        if let Err(err) = req.response.reply(req.a + req.b) {
            println!("reply refused: {}", err);
        }
    })?;

    let sum = messenger.request_default(Sum {
        a: 2,
        b: 3,
        response: ResponseSlot::new(),
    })?;
    println!("2 + 3 = {}", sum);

    let plugins: Vec<_> = ["spell", "lint", "format"]
        .iter()
        .map(|name| Arc::new(Plugin(*name)))
        .collect();

    for plugin in &plugins {
        messenger.register_default(
            plugin,
            |p: &Plugin, req: &mut CollectionRequestMessage<&'static str>| req.reply(p.0),
        )?;
    }

    let names = messenger.request_default(CollectionRequestMessage::<&'static str>::new())?;
    println!("plugins: {:?}", names);

    messenger.register_default(&calc, |_: &Calculator, req: &mut AsyncRequestMessage<u64>| {
        let _ = req.reply_with(async {
            tokio::task::yield_now().await;
            42
        });
    })?;

    let answer = messenger.request_default(AsyncRequestMessage::<u64>::new())?.await;
    println!("async answer: {}", answer);

    Ok(())
}
