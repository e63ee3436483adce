//! Identifiers for records created while the backend was unreachable.

use chrono::Utc;
use rand::Rng;

/// Marker carried by every id generated on the client.
pub const LOCAL_ID_PREFIX: &str = "local_";

const SUFFIX_LEN: usize = 9;
const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Returns true if `id` was generated locally and has not been synced yet.
pub fn is_local(id: &str) -> bool {
  id.starts_with(LOCAL_ID_PREFIX)
}

/// Generate `local_<unix millis>_<9 random base36 chars>`.
///
/// Collisions are not checked; the random suffix makes them negligible for
/// a single user.
pub fn generate() -> String {
  let mut rng = rand::thread_rng();
  let suffix: String = (0..SUFFIX_LEN)
    .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
    .collect();

  format!(
    "{}{}_{}",
    LOCAL_ID_PREFIX,
    Utc::now().timestamp_millis(),
    suffix
  )
}
