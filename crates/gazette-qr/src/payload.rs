//! QR payloads and follow commands.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

use crate::resolve::{FollowTarget, FollowType};

/// Characters left intact when encoding a whole URL: unreserved marks plus
/// the reserved characters that give a URL its structure.
const URL_KEEP: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')')
    .remove(b';')
    .remove(b',')
    .remove(b'/')
    .remove(b'?')
    .remove(b':')
    .remove(b'@')
    .remove(b'&')
    .remove(b'=')
    .remove(b'+')
    .remove(b'$')
    .remove(b'#');

/// URL the QR code points to for `target`.
pub fn destination_url(app_url: &str, target: &FollowTarget) -> String {
    let composed = format!(
        "{}/?{}={}",
        app_url.trim_end_matches('/'),
        target.follow_type.query_param(),
        target.raw_argument
    );
    utf8_percent_encode(&composed, URL_KEEP).to_string()
}

/// Chat command that subscribes to `target`.
pub fn follow_command(target: &FollowTarget) -> String {
    let verb = match target.follow_type {
        FollowType::Person => "Suivre",
        FollowType::Organisation => "SuivreO",
        FollowType::RoleTag => "SuivreF",
    };
    format!("{verb} {}", target.raw_argument)
}
