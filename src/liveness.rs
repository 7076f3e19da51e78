use tokio::sync::watch;

/// Single-slot serving/draining signal (C8). `/health` reads it on every
/// request; the shutdown handler flips it once.
#[derive(Clone)]
pub struct LivenessGate {
    tx: watch::Sender<bool>,
}

impl LivenessGate {
    pub fn new() -> (Self, LivenessReader) {
        let (tx, rx) = watch::channel(true);
        (Self { tx }, LivenessReader { rx })
    }

    pub fn drain(&self) {
        let _ = self.tx.send(false);
    }
}

#[derive(Clone)]
pub struct LivenessReader {
    rx: watch::Receiver<bool>,
}

impl LivenessReader {
    pub fn is_serving(&self) -> bool {
        *self.rx.borrow()
    }
}
