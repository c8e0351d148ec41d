use fnv::FnvHashMap;
use smallvec::SmallVec;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

/// An event value that knows the name it is dispatched under.
pub trait NamedEvent {
    fn name(&self) -> &'static str;
}

pub type Listener<E> = Rc<dyn Fn(&E) -> anyhow::Result<()>>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

pub struct EventBus<E> {
    listeners: RefCell<FnvHashMap<String, SmallVec<[(ListenerId, Listener<E>); 4]>>>,
    next_id: Cell<u64>,
    hold_depth: Cell<u32>,
    pending: RefCell<VecDeque<E>>,
}

impl<E: NamedEvent> EventBus<E> {
    pub fn new() -> Self {
        Self {
            listeners: RefCell::new(FnvHashMap::default()),
            next_id: Cell::new(1),
            hold_depth: Cell::new(0),
            pending: RefCell::new(VecDeque::new()),
        }
    }

    pub fn on(
        &self,
        name: &str,
        listener: impl Fn(&E) -> anyhow::Result<()> + 'static,
    ) -> ListenerId {
        let id = ListenerId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.listeners
            .borrow_mut()
            .entry(name.to_string())
            .or_default()
            .push((id, Rc::new(listener)));
        id
    }

    pub fn off(&self, name: &str, id: ListenerId) -> bool {
        let mut map = self.listeners.borrow_mut();
        let Some(list) = map.get_mut(name) else {
            return false;
        };
        let Some(pos) = list.iter().position(|(lid, _)| *lid == id) else {
            return false;
        };
        list.remove(pos);
        if list.is_empty() {
            map.remove(name);
        }
        true
    }

    pub fn listener_count(&self, name: &str) -> usize {
        self.listeners.borrow().get(name).map_or(0, |l| l.len())
    }

    pub fn clear(&self) {
        self.listeners.borrow_mut().clear();
    }

    pub fn emit(&self, event: E) {
        if self.hold_depth.get() > 0 {
            self.pending.borrow_mut().push_back(event);
            return;
        }
        self.dispatch(&event);
    }

    /// Run `f` with dispatch held; queued events are flushed in order when
    /// the outermost deferred section ends.
    pub fn deferred<T>(&self, f: impl FnOnce() -> T) -> T {
        self.hold_depth.set(self.hold_depth.get() + 1);
        let out = f();
        self.hold_depth.set(self.hold_depth.get() - 1);
        if self.hold_depth.get() == 0 {
            self.flush();
        }
        out
    }

    fn flush(&self) {
        loop {
            let next = self.pending.borrow_mut().pop_front();
            match next {
                Some(ev) => self.dispatch(&ev),
                None => break,
            }
        }
    }

    fn dispatch(&self, event: &E) {
        let name = event.name();
        // Snapshot so listeners may call on/off while we iterate.
        let snapshot: SmallVec<[Listener<E>; 4]> = match self.listeners.borrow().get(name) {
            Some(list) => list.iter().map(|(_, l)| l.clone()).collect(),
            None => return,
        };
        for listener in snapshot {
            if let Err(e) = listener(event) {
                log::error!("[events] listener for '{}' failed: {:#}", name, e);
            }
        }
    }
}

impl<E: NamedEvent> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}
