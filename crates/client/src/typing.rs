//! Tipp-Indikator mit Debounce
//!
//! Ein einziger Timer pro Client. Jeder Tastendruck setzt ihn zurueck;
//! `typing:start` geht nur beim Uebergang von ruhig zu tippend raus,
//! `typing:stop` nur, wenn der Timer ablaeuft.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use sealroom_core::types::RoomId;
use sealroom_protocol::{ClientEvent, RoomRequest};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Ruhezeit bis `typing:stop`
pub const TIPP_PAUSE: Duration = Duration::from_millis(2000);

/// Debounce-Zustand des Tipp-Indikators
#[derive(Debug)]
pub struct TypingDebounce {
    pause: Duration,
    tippt: Arc<AtomicBool>,
    timer: Option<JoinHandle<()>>,
}

impl Default for TypingDebounce {
    fn default() -> Self {
        Self::neu(TIPP_PAUSE)
    }
}

impl TypingDebounce {
    pub fn neu(pause: Duration) -> Self {
        Self {
            pause,
            tippt: Arc::new(AtomicBool::new(false)),
            timer: None,
        }
    }

    pub fn tippt(&self) -> bool {
        self.tippt.load(Ordering::SeqCst)
    }

    /// Registriert einen Tastendruck und startet den Timer neu
    ///
    /// Gibt `true` zurueck, wenn damit das Tippen beginnt und der Aufrufer
    /// `typing:start` senden soll.
    pub fn tastendruck(
        &mut self,
        room_id: RoomId,
        abgehend: mpsc::UnboundedSender<ClientEvent>,
    ) -> bool {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
        let beginnt = !self.tippt.swap(true, Ordering::SeqCst);

        let tippt = Arc::clone(&self.tippt);
        let pause = self.pause;
        self.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(pause).await;
            tippt.store(false, Ordering::SeqCst);
            let stop = ClientEvent::TypingStop(RoomRequest::neu(room_id));
            if abgehend.send(stop).is_err() {
                tracing::debug!("typing:stop nicht gesendet, Ausgang geschlossen");
            }
        }));
        beginnt
    }

    /// Bricht den Timer ab, ohne `typing:stop` zu senden
    pub fn abbrechen(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
        self.tippt.store(false, Ordering::SeqCst);
    }
}

impl Drop for TypingDebounce {
    fn drop(&mut self) {
        self.abbrechen();
    }
}
