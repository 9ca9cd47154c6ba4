//! Matching broadcast messages across group members
//!
//! Every combine step needs exactly one message per group member and round.
//! Messages of consecutive rounds are paired by sender ID before the later
//! message is checked against the earlier one. Any failure aborts the whole
//! combine step; no sender is silently dropped.

use std::collections::HashMap;

#[cfg(feature = "multi-thread")]
use rayon::prelude::*;
use tracing::warn;

use crate::types::Message;
use crate::{Error, Result, SignerId};

/// Index one round's messages by sender.
///
/// Fails with [`Error::IncompleteGroup`] unless there are exactly
/// `group_size` messages, and with [`Error::DuplicateSender`] if a sender
/// appears twice.
pub fn index_by_sender<'a, M: Message>(
    what: &'static str,
    messages: &'a [M],
    group_size: usize,
) -> Result<HashMap<&'a str, &'a M>> {
    if messages.len() != group_size {
        warn!(what, expected = group_size, actual = messages.len(), "incomplete group");
        return Err(Error::IncompleteGroup {
            what,
            expected: group_size,
            actual: messages.len(),
        });
    }

    let mut by_sender = HashMap::with_capacity(messages.len());
    for message in messages {
        let sender = message.sender_id();
        if by_sender.insert(sender.as_str(), message).is_some() {
            warn!(what, sender = %sender, "duplicate sender");
            return Err(Error::DuplicateSender {
                what,
                sender: sender.clone(),
            });
        }
    }

    Ok(by_sender)
}

/// Pair every message of `first` with the message of `second` from the same
/// sender, preserving the order of `first`.
pub fn pair_by_sender<'a, A: Message, B: Message>(
    first_what: &'static str,
    first: &'a [A],
    second_what: &'static str,
    second: &'a [B],
    group_size: usize,
) -> Result<Vec<(&'a A, &'a B)>> {
    // checked for its count and duplicates only
    index_by_sender(first_what, first, group_size)?;
    let mut second_by_sender = index_by_sender(second_what, second, group_size)?;

    first
        .iter()
        .map(|a| {
            let sender = a.sender_id();
            match second_by_sender.remove(sender.as_str()) {
                Some(b) => Ok((a, b)),
                None => {
                    warn!(what = second_what, sender = %sender, "no matching message");
                    Err(Error::NoMatchingMessage {
                        what: second_what,
                        sender: sender.clone(),
                    })
                }
            }
        })
        .collect()
}

/// Order one round's messages by `senders`, the members that took part in
/// an earlier round.
///
/// Besides the checks of [`index_by_sender`], fails with
/// [`Error::NoMatchingMessage`] for an expected sender without a message.
pub fn match_senders<'a, M: Message>(
    what: &'static str,
    messages: &'a [M],
    senders: &[SignerId],
) -> Result<Vec<&'a M>> {
    let mut by_sender = index_by_sender(what, messages, senders.len())?;

    senders
        .iter()
        .map(|sender| {
            by_sender.remove(sender.as_str()).ok_or_else(|| {
                warn!(what, sender = %sender, "no matching message");
                Error::NoMatchingMessage {
                    what,
                    sender: sender.clone(),
                }
            })
        })
        .collect()
}

/// Run `is_valid` on every pair and reject the combine step if any fails.
pub fn verify_all<A, B, F>(what: &'static str, pairs: &[(&A, &B)], is_valid: F) -> Result<()>
where
    A: Sync,
    B: Message + Sync,
    F: Fn(&A, &B) -> bool + Send + Sync,
{
    #[cfg(feature = "multi-thread")]
    let rejected = pairs.par_iter().find_first(|(a, b)| !is_valid(a, b));
    #[cfg(not(feature = "multi-thread"))]
    let rejected = pairs.iter().find(|(a, b)| !is_valid(a, b));

    match rejected {
        Some((_, b)) => {
            let sender = b.sender_id().clone();
            warn!(what, sender = %sender, "message rejected");
            Err(Error::MessageRejected { what, sender })
        }
        None => Ok(()),
    }
}
