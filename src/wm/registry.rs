//! Client Registry
//!
//! Owns every managed client in a generational arena. Stacking order is a
//! separate sequence of ids, head first: the most recently managed or
//! focused client sits at index 0.

use x11rb::protocol::xproto::Window;

use crate::wm::client::Client;

/// Stable handle to a managed client.
///
/// Ids are never reused for a different client: a removed slot bumps its
/// generation, so a stale id simply fails to resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientId {
    index: u32,
    generation: u32,
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    client: Option<Client>,
}

#[derive(Debug, Default)]
pub struct ClientRegistry {
    slots: Vec<Slot>,
    free: Vec<u32>,
    stack: Vec<ClientId>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a client without placing it in the stack
    pub fn insert(&mut self, client: Client) -> ClientId {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.client = Some(client);
            ClientId { index, generation: slot.generation }
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot { generation: 0, client: Some(client) });
            ClientId { index, generation: 0 }
        }
    }

    /// Drop a client from the arena and the stack
    pub fn remove(&mut self, id: ClientId) -> Option<Client> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        let client = slot.client.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        self.detach(id);
        Some(client)
    }

    pub fn get(&self, id: ClientId) -> Option<&Client> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.client.as_ref())
    }

    pub fn get_mut(&mut self, id: ClientId) -> Option<&mut Client> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.client.as_mut())
    }

    pub fn contains(&self, id: ClientId) -> bool {
        self.get(id).is_some()
    }

    /// Put a client at the head of the stack
    pub fn attach(&mut self, id: ClientId) {
        if self.contains(id) && !self.stack.contains(&id) {
            self.stack.insert(0, id);
        }
    }

    /// Unlink a client from the stack, keeping it in the arena
    pub fn detach(&mut self, id: ClientId) {
        self.stack.retain(|&other| other != id);
    }

    /// Client ids, head first
    pub fn stack(&self) -> &[ClientId] {
        &self.stack
    }

    /// Find the stacked client owning `window`
    pub fn lookup(&self, window: Window) -> Option<ClientId> {
        self.stack
            .iter()
            .copied()
            .find(|&id| self.get(id).is_some_and(|c| c.window == window))
    }

    /// Window ids in stack order
    pub fn windows(&self) -> Vec<Window> {
        self.stack
            .iter()
            .filter_map(|&id| self.get(id))
            .map(|c| c.window)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::Geometry;

    fn client(window: Window) -> Client {
        Client::new(window, Geometry::new(0, 0, 10, 10), 0)
    }

    #[test]
    fn test_attach_puts_client_at_head() {
        let mut reg = ClientRegistry::new();
        let a = reg.insert(client(1));
        let b = reg.insert(client(2));
        reg.attach(a);
        reg.attach(b);
        assert_eq!(reg.stack(), &[b, a]);
        assert_eq!(reg.windows(), vec![2, 1]);

        reg.detach(a);
        reg.attach(a);
        assert_eq!(reg.stack(), &[a, b]);
    }

    #[test]
    fn test_lookup_only_sees_stacked_clients() {
        let mut reg = ClientRegistry::new();
        let a = reg.insert(client(7));
        assert_eq!(reg.lookup(7), None);
        reg.attach(a);
        assert_eq!(reg.lookup(7), Some(a));
        assert_eq!(reg.lookup(8), None);
    }

    #[test]
    fn test_removed_id_goes_stale_after_slot_reuse() {
        let mut reg = ClientRegistry::new();
        let a = reg.insert(client(1));
        reg.attach(a);
        assert_eq!(reg.remove(a).map(|c| c.window), Some(1));
        assert!(reg.is_empty());

        let b = reg.insert(client(2));
        reg.attach(b);
        assert_ne!(a, b);
        assert!(reg.get(a).is_none());
        assert!(reg.remove(a).is_none());
        assert_eq!(reg.get(b).map(|c| c.window), Some(2));
    }

    #[test]
    fn test_double_attach_keeps_single_entry() {
        let mut reg = ClientRegistry::new();
        let a = reg.insert(client(1));
        reg.attach(a);
        reg.attach(a);
        assert_eq!(reg.len(), 1);
    }
}
