//! Messages from generation workers to the engine.

use std::sync::mpsc::channel;

use crate::common::*;

/// Sender / receiver pair alias type.
pub type Channel<T> = (Sender<T>, Receiver<T>);

/// Channel from the generation workers to the engine.
pub fn from_workers() -> Channel<Msg> {
    channel()
}

/// What a message from a worker contains.
pub enum MsgKind {
    /// Freshly generated inputs.
    Trees(Vec<Tree>),
    /// Some debug message.
    Msg(String),
    /// An error.
    Err(Error),
    /// The worker is done, here is its profiler.
    Done(Box<Profiler>),
}
impl From<Error> for MsgKind {
    fn from(err: Error) -> Self {
        MsgKind::Err(err)
    }
}

/// Message from a worker.
pub struct Msg {
    /// Sender.
    pub id: GenIdx,
    /// Content.
    pub kind: MsgKind,
}
impl Msg {
    /// Constructor.
    pub fn new<K: Into<MsgKind>>(id: GenIdx, kind: K) -> Self {
        Msg {
            id,
            kind: kind.into(),
        }
    }
}

/// Worker-side handle on the channel to the engine.
pub struct GenCore {
    /// Index of the worker.
    pub id: GenIdx,
    /// Channel to the engine.
    sender: Sender<Msg>,
}
impl GenCore {
    /// Constructor.
    pub fn new(id: GenIdx, sender: Sender<Msg>) -> Self {
        GenCore { id, sender }
    }

    /// Sends generated inputs. False if the engine is disconnected.
    pub fn send_trees(&self, trees: Vec<Tree>) -> bool {
        self.sender.send(Msg::new(self.id, MsgKind::Trees(trees))).is_ok()
    }

    /// Sends a debug message. False if the engine is disconnected.
    pub fn msg<S: Into<String>>(&self, msg: S) -> bool {
        self.sender
            .send(Msg::new(self.id, MsgKind::Msg(msg.into())))
            .is_ok()
    }

    /// Sends an error. False if the engine is disconnected.
    pub fn err(&self, err: Error) -> bool {
        if err.is_exit() {
            return self.exit(Profiler::new());
        }
        self.sender.send(Msg::new(self.id, MsgKind::Err(err))).is_ok()
    }

    /// Signals the engine this worker is done.
    pub fn exit(&self, prof: Profiler) -> bool {
        self.sender
            .send(Msg::new(self.id, MsgKind::Done(Box::new(prof))))
            .is_ok()
    }
}
