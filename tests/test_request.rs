use std::sync::Arc;

use messenger::{
    messages::{
        AsyncCollectionRequestMessage, AsyncRequestMessage, CollectionRequestMessage,
        PropertyChangedMessage, RequestMessage, ResponseSlot, ValueChangedMessage,
    },
    Error, Messenger, MessengerExt, Request, StrongReferenceMessenger, WeakReferenceMessenger,
};

#[derive(Debug)]
struct SumRequest {
    a: i32,
    b: i32,
    response: ResponseSlot<i32>,
}

impl SumRequest {
    fn new(a: i32, b: i32) -> Self {
        Self {
            a,
            b,
            response: ResponseSlot::new(),
        }
    }
}

impl Request for SumRequest {
    type Response = i32;

    fn into_response(self) -> Option<i32> {
        self.response.into_inner()
    }
}

struct Calculator;

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn sum_is_answered<X: Messenger + Default>() -> anyhow::Result<()> {
    let messenger = X::default();
    let calc = Arc::new(Calculator);

    messenger.register_default(&calc, |_: &Calculator, req: &mut SumRequest| {
        let sum = req.a + req.b;
        let _ = req.response.reply(sum);
    })?;

    assert_eq!(messenger.request_default(SumRequest::new(2, 3))?, 5);

    Ok(())
}

fn unanswered_request_fails<X: Messenger + Default>() {
    let messenger = X::default();

    assert!(matches!(
        messenger.request_default(SumRequest::new(2, 3)),
        Err(Error::NoResponseReceived { .. })
    ));

    // a recipient that looks but does not answer is no better
    let calc = Arc::new(Calculator);
    messenger
        .register_default(&calc, |_: &Calculator, _: &mut SumRequest| {})
        .unwrap();

    assert!(matches!(
        messenger.request_default(SumRequest::new(2, 3)),
        Err(Error::NoResponseReceived { .. })
    ));
}

fn first_responder_wins<X: Messenger + Default>() {
    let messenger = X::default();
    let first = Arc::new(Calculator);
    let second = Arc::new(Calculator);
    let refused = Arc::new(parking_lot::Mutex::new(None));

    messenger
        .register(&first, 1u8, |_: &Calculator, req: &mut RequestMessage<&'static str>| {
            req.reply("first").unwrap();
        })
        .unwrap();

    let seen = refused.clone();
    messenger
        .register(&second, 1u8, move |_: &Calculator, req: &mut RequestMessage<&'static str>| {
            *seen.lock() = Some(req.reply("second"));
        })
        .unwrap();

    assert_eq!(messenger.request(RequestMessage::<&'static str>::new(), 1u8), Ok("first"));
    assert_eq!(*refused.lock(), Some(Err(Error::ResponseAlreadySet)));
}

fn collection_request_gathers_everyone<X: Messenger + Default>() {
    let messenger = X::default();
    let recipients: Vec<_> = (0..3).map(|_| Arc::new(Calculator)).collect();

    for (i, r) in recipients.iter().enumerate() {
        messenger
            .register_default(r, move |_: &Calculator, req: &mut CollectionRequestMessage<usize>| {
                req.reply(i)
            })
            .unwrap();
    }

    assert_eq!(
        messenger.request_default(CollectionRequestMessage::<usize>::new()),
        Ok(vec![0, 1, 2])
    );

    messenger.reset();
    assert_eq!(
        messenger.request_default(CollectionRequestMessage::<usize>::new()),
        Ok(vec![])
    );
}

macro_rules! for_each_messenger {
    ($($name:ident),* $(,)?) => {
        mod strong {
            use super::*;
            $(#[test] fn $name() { init(); super::$name::<StrongReferenceMessenger>() })*
        }

        mod weak {
            use super::*;
            $(#[test] fn $name() { init(); super::$name::<WeakReferenceMessenger>() })*
        }
    };
}

for_each_messenger!(
    unanswered_request_fails,
    first_responder_wins,
    collection_request_gathers_everyone,
);

#[test]
fn sum_request_strong() -> anyhow::Result<()> {
    init();
    sum_is_answered::<StrongReferenceMessenger>()
}

#[test]
fn sum_request_weak() -> anyhow::Result<()> {
    init();
    sum_is_answered::<WeakReferenceMessenger>()
}

#[tokio::test]
async fn async_request_is_awaited_after_send() -> anyhow::Result<()> {
    init();

    let messenger = StrongReferenceMessenger::new();
    let calc = Arc::new(Calculator);

    messenger.register_default(&calc, |_: &Calculator, req: &mut AsyncRequestMessage<u64>| {
        req.reply_with(async {
            tokio::task::yield_now().await;
            42
        })
        .unwrap();
    })?;

    let answer = messenger.request_default(AsyncRequestMessage::<u64>::new())?;
    assert_eq!(answer.await, 42);

    Ok(())
}

#[tokio::test]
async fn async_collection_request_joins_replies() -> anyhow::Result<()> {
    init();

    let messenger = WeakReferenceMessenger::new();
    let a = Arc::new(Calculator);
    let b = Arc::new(Calculator);

    messenger.register_default(&a, |_: &Calculator, req: &mut AsyncCollectionRequestMessage<u64>| {
        req.reply(1)
    })?;
    messenger.register_default(&b, |_: &Calculator, req: &mut AsyncCollectionRequestMessage<u64>| {
        req.reply_with(async { 2 })
    })?;

    let replies = messenger
        .request_default(AsyncCollectionRequestMessage::<u64>::new())?
        .await;
    assert_eq!(replies, vec![1, 2]);

    Ok(())
}

#[test]
fn change_notifications_carry_values() {
    init();

    let messenger = StrongReferenceMessenger::new();
    let r = Arc::new(Calculator);
    let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));

    let sink = seen.clone();
    messenger
        .register_default(&r, move |_: &Calculator, msg: &mut ValueChangedMessage<i32>| {
            sink.lock().push(format!("value={}", msg.value))
        })
        .unwrap();

    let sink = seen.clone();
    messenger
        .register(&r, "settings", move |_: &Calculator, msg: &mut PropertyChangedMessage<bool>| {
            sink.lock().push(format!(
                "{}: {} -> {}",
                msg.property_name, msg.old_value, msg.new_value
            ))
        })
        .unwrap();

    messenger.send_default(ValueChangedMessage::new(3));
    messenger.send(PropertyChangedMessage::new("dark_mode", false, true), "settings");

    // wrong payload type, different channel
    messenger.send_default(ValueChangedMessage::new(3u8));

    assert_eq!(
        *seen.lock(),
        vec!["value=3".to_string(), "dark_mode: false -> true".to_string()]
    );
}
