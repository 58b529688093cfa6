// tests/delivery.rs
//
// Deliver trigger: read-if-ready, generate-if-missing, fallback text when
// generation cannot be persisted.

mod common;

use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use common::*;
use daily_compliment::daily::DailySettings;
use daily_compliment::notify::{Delivery, LogNotifier, Notifier};
use daily_compliment::store::{Datastore, MemoryStore};

#[derive(Default)]
struct Recorder {
    sent: Mutex<Vec<(i64, String)>>,
    fail_chat: Option<i64>,
}

#[async_trait]
impl Notifier for Recorder {
    async fn send(&self, chat_id: i64, text: &str) -> Result<()> {
        if self.fail_chat == Some(chat_id) {
            return Err(anyhow!("chat {chat_id} blocked the bot"));
        }
        self.sent.lock().unwrap().push((chat_id, text.to_string()));
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recorder"
    }
}

#[tokio::test]
async fn ready_compliment_is_sent_without_generation() {
    let store = Arc::new(MemoryStore::new());
    let d = day(2025, 6, 1);
    store
        .insert(stored(d, "You are the calm in everyone's news feed."))
        .await
        .unwrap();
    let h = Harness::new(StaticNews::new(&["Stocks rally"]), ScriptedText::new()).store(store);
    let rec = Arc::new(Recorder::default());
    let delivery = Delivery::new(h.build(), rec.clone(), vec![11, 22]);

    let report = delivery.deliver(d).await;
    assert_eq!(report.sent, 2);
    assert_eq!(report.failed, 0);
    assert!(!report.used_fallback);
    assert_eq!(h.text.calls(), 0);

    let sent = rec.sent.lock().unwrap().clone();
    assert_eq!(
        sent,
        vec![
            (11, "You are the calm in everyone's news feed.".to_string()),
            (22, "You are the calm in everyone's news feed.".to_string()),
        ]
    );
}

#[tokio::test]
async fn missing_compliment_is_generated_before_delivery() {
    let h = Harness::new(StaticNews::new(&["Stocks rally"]), ScriptedText::new());
    let machine = h.build();
    let rec = Arc::new(Recorder::default());
    let delivery = Delivery::new(machine.clone(), rec.clone(), vec![7]);
    let d = day(2025, 6, 2);

    let report = delivery.deliver(d).await;
    assert_eq!(report.sent, 1);
    assert!(!report.used_fallback);

    let row = h.store.get_by_date(d).await.unwrap().expect("generated on demand");
    assert_eq!(report.text, row.text);
    assert_eq!(rec.sent.lock().unwrap()[0].1, row.text);
}

#[tokio::test]
async fn storage_outage_still_delivers_fallback_text() {
    let h = Harness::new(StaticNews::new(&["Stocks rally"]), ScriptedText::new()).store(FlakyStore::new(usize::MAX));
    let rec = Arc::new(Recorder::default());
    let delivery = Delivery::new(h.build(), rec.clone(), vec![1]);

    let report = delivery.deliver(day(2025, 6, 3)).await;
    assert!(report.used_fallback);
    assert_eq!(report.text, DailySettings::default().fallback_text);
    assert_eq!(rec.sent.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn one_failing_chat_does_not_block_the_others() {
    let h = Harness::new(StaticNews::new(&["Stocks rally"]), ScriptedText::new());
    let rec = Arc::new(Recorder {
        fail_chat: Some(2),
        ..Recorder::default()
    });
    let delivery = Delivery::new(h.build(), rec.clone(), vec![1, 2, 3]);

    let report = delivery.deliver(day(2025, 6, 4)).await;
    assert_eq!(report.sent, 2);
    assert_eq!(report.failed, 1);
    let chats: Vec<i64> = rec.sent.lock().unwrap().iter().map(|(c, _)| *c).collect();
    assert_eq!(chats, vec![1, 3]);
}

#[tokio::test]
async fn log_notifier_accepts_everything() {
    let h = Harness::new(StaticNews::new(&["Stocks rally"]), ScriptedText::new());
    let delivery = Delivery::new(h.build(), Arc::new(LogNotifier), vec![42]);
    let report = delivery.deliver(day(2025, 6, 5)).await;
    assert_eq!((report.sent, report.failed), (1, 0));
}
