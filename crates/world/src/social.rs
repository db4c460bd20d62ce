//! Friend and ignore lists
//!
//! Friends are kept in display order: on this world first, then on another
//! world, then offline. The order within each group is the order the server
//! sent them in.

use mudsync_protocol::{decode_name, FriendStatus};
use serde::Serialize;

/// Online value of a friend on the same world
pub const ONLINE_HERE: u8 = 255;

/// Largest list the server can send (the count is one byte)
pub const MAX_FRIENDS: usize = 255;
pub const MAX_IGNORES: usize = 255;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Friend {
    pub name_hash: u64,
    pub name: String,
    /// 0 offline, [`ONLINE_HERE`] on this world, otherwise a world number
    pub online: u8,
}

impl Friend {
    fn from_status(status: FriendStatus) -> Self {
        Self {
            name_hash: status.name_hash,
            name: decode_name(status.name_hash),
            online: status.online,
        }
    }

    #[inline]
    pub fn is_online(&self) -> bool {
        self.online != 0
    }

    fn display_rank(&self) -> u8 {
        match self.online {
            ONLINE_HERE => 0,
            0 => 2,
            _ => 1,
        }
    }
}

/// Result of a status change for an existing or new friend
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FriendChange {
    LoggedIn(String),
    LoggedOut(String),
    /// Moved worlds or no change worth announcing
    Updated,
    Added,
    /// The list was full
    Dropped,
}

#[derive(Debug, Clone, Default)]
pub struct FriendList {
    friends: Vec<Friend>,
}

impl FriendList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole list
    pub fn replace(&mut self, statuses: Vec<FriendStatus>) {
        self.friends = statuses
            .into_iter()
            .take(MAX_FRIENDS)
            .map(Friend::from_status)
            .collect();
        self.sort();
    }

    /// Update one friend, appending it when unknown
    pub fn apply_status(&mut self, status: FriendStatus) -> FriendChange {
        let len = self.friends.len();
        let change = match self
            .friends
            .iter_mut()
            .find(|friend| friend.name_hash == status.name_hash)
        {
            Some(friend) => {
                let change = match (friend.is_online(), status.online != 0) {
                    (false, true) => FriendChange::LoggedIn(friend.name.clone()),
                    (true, false) => FriendChange::LoggedOut(friend.name.clone()),
                    _ => FriendChange::Updated,
                };
                friend.online = status.online;
                change
            }
            None if len >= MAX_FRIENDS => return FriendChange::Dropped,
            None => {
                self.friends.push(Friend::from_status(status));
                FriendChange::Added
            }
        };
        self.sort();
        change
    }

    fn sort(&mut self) {
        // stable, so server order survives within a group
        self.friends.sort_by_key(Friend::display_rank);
    }

    pub fn get(&self, name_hash: u64) -> Option<&Friend> {
        self.friends.iter().find(|friend| friend.name_hash == name_hash)
    }

    #[inline]
    pub fn as_slice(&self) -> &[Friend] {
        &self.friends
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.friends.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.friends.is_empty()
    }

    pub fn clear(&mut self) {
        self.friends.clear();
    }
}
