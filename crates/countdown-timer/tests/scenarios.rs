// End-to-end countdown behaviour against an in-memory chat.
// Time-based tests run on tokio's paused clock, so minutes pass instantly.

use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicI64, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use countdown_core::{
    config::TimerConfig, ConversationId, MessageRef, SessionKey, Transport, TransportError, View,
};
use countdown_timer::{
    parse_duration, views, ControlDispatcher, DisplayAdapter, InboundIntent, Intent, Outcome,
    Timer, TimerEngine, TimerError, TimerRegistry, TimerState, TimerStore,
};
use tokio::time::sleep;

const CHAT: i64 = -1001;

#[derive(Debug, Clone, PartialEq)]
enum Event {
    Sent { id: i64, text: String },
    Edited { id: i64, text: String },
    Deleted(i64),
    Pinned(i64),
}

/// A single group chat. Messages removed with `user_deletes` can no longer be
/// edited, like a real platform.
#[derive(Default)]
struct Chat {
    events: Mutex<Vec<Event>>,
    gone: Mutex<HashSet<i64>>,
    next_id: AtomicI64,
}

impl Chat {
    fn user_deletes(&self, id: i64) {
        self.gone.lock().unwrap().insert(id);
    }

    fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    fn edits_of(&self, id: i64) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Edited { id: m, text } if m == id => Some(text),
                _ => None,
            })
            .collect()
    }

    fn sent_texts(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Sent { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    fn times_up_notices(&self) -> usize {
        self.sent_texts()
            .iter()
            .filter(|t| t.starts_with("🚨"))
            .count()
    }
}

#[async_trait]
impl Transport for Chat {
    async fn send_message(
        &self,
        conversation: ConversationId,
        view: &View,
    ) -> Result<MessageRef, TransportError> {
        let id = 500 + self.next_id.fetch_add(1, Ordering::SeqCst);
        self.events.lock().unwrap().push(Event::Sent {
            id,
            text: view.text.clone(),
        });
        Ok(MessageRef::new(conversation.0, id))
    }

    async fn edit_message(&self, message: &MessageRef, view: &View) -> Result<(), TransportError> {
        let id = message.message.0;
        if self.gone.lock().unwrap().contains(&id) {
            return Err(TransportError::MessageNotFound(message.to_string()));
        }
        self.events.lock().unwrap().push(Event::Edited {
            id,
            text: view.text.clone(),
        });
        Ok(())
    }

    async fn delete_message(&self, message: &MessageRef) -> Result<(), TransportError> {
        self.events
            .lock()
            .unwrap()
            .push(Event::Deleted(message.message.0));
        Ok(())
    }

    async fn pin_message(&self, message: &MessageRef) -> Result<(), TransportError> {
        self.events
            .lock()
            .unwrap()
            .push(Event::Pinned(message.message.0));
        Ok(())
    }
}

struct Bot {
    chat: Arc<Chat>,
    registry: Arc<TimerRegistry>,
    dispatcher: ControlDispatcher,
}

fn bot_with(config: TimerConfig) -> Bot {
    let chat = Arc::new(Chat::default());
    let registry = Arc::new(TimerRegistry::new());
    let display = Arc::new(DisplayAdapter::new(
        chat.clone(),
        Arc::clone(&registry),
        &config,
    ));
    let engine = Arc::new(TimerEngine::new(Arc::clone(&registry), display, config));
    Bot {
        chat,
        registry,
        dispatcher: ControlDispatcher::new(engine),
    }
}

fn bot() -> Bot {
    bot_with(TimerConfig::default())
}

fn key(anchor: i64) -> SessionKey {
    SessionKey::new(CHAT, anchor)
}

/// What a chat binding does: propose, post the prompt, confirm on it.
async fn start(bot: &Bot, anchor: i64, text: &str) -> Timer {
    let outcome = bot
        .dispatcher
        .dispatch(InboundIntent::new(
            key(anchor),
            Intent::Propose { text: text.into() },
        ))
        .await
        .unwrap();
    let Outcome::Proposed(proposal) = outcome else {
        panic!("expected a proposal, got {outcome:?}");
    };
    let prompt = bot
        .chat
        .send_message(
            ConversationId(CHAT),
            &views::proposal(proposal.seconds, proposal.label.as_deref()),
        )
        .await
        .unwrap();
    match bot
        .dispatcher
        .dispatch(InboundIntent::new(key(anchor), Intent::Confirm { display: prompt }))
        .await
        .unwrap()
    {
        Outcome::Started(timer) => timer,
        other => panic!("expected a start, got {other:?}"),
    }
}

fn remaining_in(text: &str) -> Option<u64> {
    let line = text.lines().nth(1)?;
    line.ends_with("remaining...")
        .then(|| parse_duration(line).ok().map(|p| p.seconds))
        .flatten()
}

#[tokio::test(start_paused = true)]
async fn two_minute_countdown_runs_to_one_completion() {
    let bot = bot();
    let timer = start(&bot, 1, "2 minutes quiz starts").await;
    let display = timer.display.message.0;

    sleep(Duration::from_secs(125)).await;

    assert!(bot.registry.is_empty());
    assert_eq!(bot.chat.times_up_notices(), 1);
    assert!(bot
        .chat
        .sent_texts()
        .iter()
        .any(|t| t.starts_with("🚨") && t.contains("quiz starts")));

    let edits = bot.chat.edits_of(display);
    assert_eq!(edits.len(), 121, "start + 119 ticks + finished");
    assert!(edits[0].contains("started for 2 minutes"));
    assert!(edits[120].starts_with("✅"));

    let remaining: Vec<u64> = edits.iter().filter_map(|t| remaining_in(t)).collect();
    assert_eq!(remaining.len(), 119);
    assert!(remaining.windows(2).all(|w| w[0] > w[1]), "edits must count down");
    assert_eq!(remaining.first(), Some(&119));
    assert_eq!(remaining.last(), Some(&1));

    let events = bot.chat.events();
    assert_eq!(events.iter().filter(|e| **e == Event::Pinned(display)).count(), 1);
    let reminders: Vec<_> = bot
        .chat
        .sent_texts()
        .into_iter()
        .filter(|t| t.starts_with("⏳ Reminder"))
        .collect();
    assert_eq!(
        reminders,
        vec![
            "⏳ Reminder: 1 minute remaining!".to_string(),
            "⏳ Reminder: 10 seconds remaining!".to_string(),
        ]
    );
    let deleted = events
        .iter()
        .filter(|e| matches!(e, Event::Deleted(_)))
        .count();
    assert_eq!(deleted, 2, "each reminder is cleaned up");
}

#[tokio::test(start_paused = true)]
async fn zero_duration_is_refused_without_a_timer() {
    let bot = bot();
    let err = bot
        .dispatcher
        .dispatch(InboundIntent::new(
            key(1),
            Intent::Propose {
                text: "0 minutes".into(),
            },
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, TimerError::InvalidDuration(_)));
    assert!(bot.registry.is_empty());
    assert!(bot.chat.events().is_empty());
}

#[tokio::test(start_paused = true)]
async fn pause_freezes_remaining_until_resume() {
    let bot = bot();
    let timer = start(&bot, 1, "1 minute").await;

    sleep(Duration::from_millis(5_500)).await;
    bot.dispatcher.pause(timer.key).unwrap();
    assert_eq!(bot.registry.get(&timer.key).unwrap().remaining_seconds, 55);

    sleep(Duration::from_secs(10)).await;
    let held = bot.registry.get(&timer.key).unwrap();
    assert_eq!(held.state, TimerState::Paused);
    assert_eq!(held.remaining_seconds, 55);
    assert!(bot
        .chat
        .edits_of(timer.display.message.0)
        .iter()
        .any(|t| t.starts_with("⏸️")));

    bot.dispatcher.resume(timer.key).unwrap();
    sleep(Duration::from_secs(6)).await;
    let resumed = bot.registry.get(&timer.key).unwrap();
    assert_eq!(resumed.state, TimerState::Running);
    assert_eq!(resumed.remaining_seconds, 50);
}

#[tokio::test(start_paused = true)]
async fn cancel_twice_gives_one_banner_and_stops_ticking() {
    let bot = bot();
    let timer = start(&bot, 1, "10 minutes").await;
    sleep(Duration::from_millis(3_500)).await;

    let first = bot.dispatcher.cancel(timer.key).await.unwrap();
    assert_eq!(first.state, TimerState::Cancelled);
    assert!(matches!(
        bot.dispatcher.cancel(timer.key).await,
        Err(TimerError::NotFound { .. })
    ));

    sleep(Duration::from_secs(5)).await;
    let edits = bot.chat.edits_of(timer.display.message.0);
    assert_eq!(edits.iter().filter(|t| t.starts_with("❌")).count(), 1);
    assert!(edits.last().unwrap().starts_with("❌"), "nothing renders after the banner");
    assert_eq!(bot.chat.times_up_notices(), 0);
    assert_eq!(bot.dispatcher.engine().active_loops(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_cancels_produce_one_banner() {
    let bot = Arc::new(bot());
    let timer = start(&bot, 1, "10 minutes").await;

    let taps: Vec<_> = (0..2)
        .map(|_| {
            let bot = Arc::clone(&bot);
            tokio::spawn(async move { bot.dispatcher.cancel(key(1)).await })
        })
        .collect();

    let (mut cancelled, mut not_found) = (0, 0);
    for tap in taps {
        match tap.await.unwrap() {
            Ok(t) => {
                assert_eq!(t.state, TimerState::Cancelled);
                cancelled += 1;
            }
            Err(TimerError::NotFound { .. }) => not_found += 1,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    assert_eq!((cancelled, not_found), (1, 1));
    assert!(bot.registry.is_empty());

    let banners = bot
        .chat
        .edits_of(timer.display.message.0)
        .iter()
        .filter(|t| t.starts_with("❌"))
        .count();
    assert_eq!(banners, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_confirms_start_exactly_one_timer() {
    let bot = Arc::new(bot());
    bot.dispatcher.propose(key(1), "1 minute").unwrap();

    let attempts: Vec<_> = (0..8)
        .map(|i| {
            let bot = Arc::clone(&bot);
            tokio::spawn(async move {
                bot.dispatcher
                    .confirm(key(1), MessageRef::new(CHAT, 900 + i))
            })
        })
        .collect();

    let mut started = 0;
    for attempt in attempts {
        match attempt.await.unwrap() {
            Ok(_) => started += 1,
            Err(e) => assert!(matches!(e, TimerError::AlreadyExists { .. }), "{e}"),
        }
    }
    assert_eq!(started, 1);
    assert_eq!(bot.registry.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn deleted_display_ends_only_its_own_timer() {
    let bot = bot();
    let doomed = start(&bot, 1, "5 minutes").await;
    let healthy = start(&bot, 2, "5 minutes").await;

    sleep(Duration::from_millis(1_500)).await;
    bot.chat.user_deletes(doomed.display.message.0);
    sleep(Duration::from_secs(2)).await;

    assert!(!bot.registry.contains(&doomed.key));
    let other = bot.registry.get(&healthy.key).unwrap();
    assert_eq!(other.state, TimerState::Running);
    assert_eq!(other.remaining_seconds, 297);
    assert_eq!(bot.chat.times_up_notices(), 0);
}

#[tokio::test(start_paused = true)]
async fn zero_length_timer_completes_without_ticking() {
    let bot = bot();
    let display = MessageRef::new(CHAT, 77);
    bot.registry.create(key(1), 0, None, display).unwrap();
    let timer = bot.registry.set_state(&key(1), TimerState::Running).unwrap();

    bot.dispatcher.engine().start(timer).await.unwrap();

    assert!(bot.registry.is_empty());
    let edits = bot.chat.edits_of(77);
    assert_eq!(edits.len(), 1);
    assert!(edits[0].starts_with("✅"));
    assert_eq!(bot.chat.times_up_notices(), 1);
}

#[tokio::test(start_paused = true)]
async fn snapshot_restores_after_restart() {
    let store = TimerStore::new(rusqlite::Connection::open_in_memory().unwrap()).unwrap();

    let first = bot_with(TimerConfig {
        pin: false,
        ..TimerConfig::default()
    });
    let running = start(&first, 1, "10 minutes").await;
    let paused = start(&first, 2, "10 minutes").await;
    sleep(Duration::from_millis(4_500)).await;
    first.dispatcher.pause(paused.key).unwrap();
    sleep(Duration::from_secs(2)).await;

    let engine = first.dispatcher.engine();
    engine.shutdown();
    sleep(Duration::from_millis(10)).await;
    assert_eq!(engine.active_loops(), 0);
    assert_eq!(store.save_all(&first.registry.snapshot()).unwrap(), 2);

    let second = bot_with(TimerConfig {
        pin: false,
        ..TimerConfig::default()
    });
    let restored = second
        .dispatcher
        .engine()
        .restore(store.load_all().unwrap());
    assert_eq!(restored, 2);

    sleep(Duration::from_millis(3_500)).await;
    let a = second.registry.get(&running.key).unwrap();
    assert_eq!(a.remaining_seconds, 600 - 6 - 3);
    let b = second.registry.get(&paused.key).unwrap();
    assert_eq!(b.state, TimerState::Paused);
    assert_eq!(b.remaining_seconds, 596);
}
