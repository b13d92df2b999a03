//! Join playlist channels to an EPG index

use tracing::debug;

use super::EpgIndex;
use crate::models::Channel;

/// Attribute keys probed when no explicit order is given
pub const DEFAULT_KEY_ORDER: [&str; 3] = ["epg-id", "epg_channel_id", "tvg-id"];

/// Attach programme lists to `channels`.
///
/// For each channel the keys in `key_order` are tried in turn; the first
/// attribute value that names a channel in `index` wins. Channels without a
/// match are left untouched. Returns how many channels received a schedule.
pub fn map_epg(channels: &mut [Channel], index: &EpgIndex, key_order: &[&str]) -> usize {
    let mut enriched = 0;
    for channel in channels.iter_mut() {
        let matched = key_order
            .iter()
            .filter_map(|key| channel.attrs.get_non_empty(key))
            .find_map(|value| index.get(value))
            .filter(|programmes| !programmes.is_empty());

        if let Some(programmes) = matched {
            channel.epg = Some(programmes.to_vec());
            enriched += 1;
        }
    }
    debug!(channels = channels.len(), enriched, "EPG mapped");
    enriched
}
