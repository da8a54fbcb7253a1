//! [`TriggerDispatcher`] – routes discrete operator triggers (recognised
//! hand signs, buttons, remote keys) to catalogued behaviors.
//!
//! A trigger is a label such as `"Thumb_Up"`.  Dispatch is fire-and-forget:
//!
//! | Situation | Result |
//! |---|---|
//! | label not mapped | [`Dispatch::Unknown`], nothing happens |
//! | same label fired within the cooldown | [`Dispatch::CoolingDown`] |
//! | the sequencer is already running | [`Dispatch::Busy`], trigger dropped |
//! | otherwise | [`Dispatch::Started`], the behavior runs on the runtime |
//!
//! Dropped triggers do not start a cooldown.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use stride_types::StrideError;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::sequencer::{BehaviorExecutionResult, BehaviorSequencer};

/// Minimum spacing between two dispatches of the same trigger.
pub const DEFAULT_TRIGGER_COOLDOWN: Duration = Duration::from_secs(2);

/// Hand-sign labels mapped onto the standard catalog.
pub fn standard_triggers() -> BTreeMap<String, u32> {
    [
        ("Thumb_Up", 1),
        ("Thumb_Down", 2),
        ("Open_Palm", 20),
        ("ILoveYou", 20),
    ]
    .into_iter()
    .map(|(label, id)| (label.to_string(), id))
    .collect()
}

/// What happened to one trigger.
#[derive(Debug)]
pub enum Dispatch {
    Unknown,
    CoolingDown { remaining: Duration },
    Busy,
    Started {
        behavior_id: u32,
        handle: JoinHandle<Result<BehaviorExecutionResult, StrideError>>,
    },
}

pub struct TriggerDispatcher {
    sequencer: Arc<BehaviorSequencer>,
    triggers: BTreeMap<String, u32>,
    cooldown: Duration,
    runtime: Handle,
    last_run: Mutex<HashMap<String, Instant>>,
    cancel: Mutex<CancellationToken>,
}

impl TriggerDispatcher {
    pub fn new(
        sequencer: Arc<BehaviorSequencer>,
        triggers: BTreeMap<String, u32>,
        cooldown: Duration,
        runtime: Handle,
    ) -> Self {
        Self {
            sequencer,
            triggers,
            cooldown,
            runtime,
            last_run: Mutex::new(HashMap::new()),
            cancel: Mutex::new(CancellationToken::new()),
        }
    }

    pub fn triggers(&self) -> &BTreeMap<String, u32> {
        &self.triggers
    }

    /// Handle one trigger without waiting for the behavior to finish.
    pub fn dispatch(&self, trigger: &str) -> Dispatch {
        let Some(&behavior_id) = self.triggers.get(trigger) else {
            debug!(trigger, "unmapped trigger ignored");
            return Dispatch::Unknown;
        };
        if self.sequencer.is_running() {
            debug!(trigger, behavior_id, "sequencer busy; trigger dropped");
            return Dispatch::Busy;
        }

        let now = Instant::now();
        {
            let mut last_run = self.last_run.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(&last) = last_run.get(trigger) {
                let since = now.duration_since(last);
                if since < self.cooldown {
                    return Dispatch::CoolingDown {
                        remaining: self.cooldown - since,
                    };
                }
            }
            last_run.insert(trigger.to_string(), now);
        }

        let cancel = self
            .cancel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .child_token();
        let sequencer = Arc::clone(&self.sequencer);
        let label = trigger.to_string();
        info!(trigger, behavior_id, "trigger dispatched");
        let handle = self.runtime.spawn(async move {
            let result = sequencer.run(behavior_id, &cancel).await;
            if let Err(e) = &result {
                warn!(trigger = %label, behavior_id, error = %e, "triggered behavior did not run");
            }
            result
        });
        Dispatch::Started { behavior_id, handle }
    }

    /// Cancel every behavior started by this dispatcher that is still
    /// running.  Later triggers are unaffected.
    ///
    /// Returns whether the sequencer was busy at the time.
    pub fn cancel_running(&self) -> bool {
        let previous = std::mem::take(&mut *self.cancel.lock().unwrap_or_else(PoisonError::into_inner));
        previous.cancel();
        self.sequencer.is_running()
    }
}
