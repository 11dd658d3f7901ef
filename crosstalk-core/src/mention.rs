//! Cross-bridge mention sigils.
//!
//! On the bus a user mention is the token `<[@id]>` where `id` is the user's
//! entity token. Each transport rewrites these to its native mention syntax
//! on egress and back to the sigil on ingress, so a mention survives a trip
//! across bridges without either side knowing the other's syntax.

use crate::event::EntityId;

const OPEN: &str = "<[@";
const CLOSE: &str = "]>";

/// Renders the wire sigil for a user token.
pub fn encode(user_id: EntityId) -> String {
    format!("{}{}{}", OPEN, user_id.raw(), CLOSE)
}

/// Replaces every well-formed sigil in `content` using `resolve`.
///
/// A sigil whose id the resolver does not know, or a malformed sigil, is
/// left in place verbatim.
pub fn rewrite<F>(content: &str, mut resolve: F) -> String
where
    F: FnMut(EntityId) -> Option<String>,
{
    let mut out = String::with_capacity(content.len());
    let mut rest = content;

    while let Some(start) = rest.find(OPEN) {
        out.push_str(&rest[..start]);
        let tail = &rest[start + OPEN.len()..];

        let parsed = tail.find(CLOSE).and_then(|end| {
            let digits = &tail[..end];
            if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            digits.parse::<u64>().ok().map(|raw| (end, EntityId::from_raw(raw)))
        });

        match parsed {
            Some((end, user_id)) => {
                match resolve(user_id) {
                    Some(name) => out.push_str(&name),
                    None => out.push_str(&rest[start..start + OPEN.len() + end + CLOSE.len()]),
                }
                rest = &tail[end + CLOSE.len()..];
            }
            None => {
                out.push_str(OPEN);
                rest = tail;
            }
        }
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_then_rewrite_round_trips() {
        let user = EntityId::allocate();
        let content = format!("ping {} please", encode(user));
        let rewritten = rewrite(&content, |id| (id == user).then(|| "@alice".to_string()));
        assert_eq!(rewritten, "ping @alice please");
    }

    #[test]
    fn unknown_ids_are_left_verbatim() {
        let content = "hey <[@99999]>!";
        assert_eq!(rewrite(content, |_| None), content);
    }

    #[test]
    fn malformed_sigils_pass_through() {
        for content in ["<[@]>", "<[@12x]>", "<[@", "plain text", "a <[@1]"] {
            assert_eq!(rewrite(content, |_| Some("@x".into())), content);
        }
    }

    #[test]
    fn multiple_sigils_rewrite_independently() {
        let a = EntityId::allocate();
        let b = EntityId::allocate();
        let content = format!("{} and {}", encode(a), encode(b));
        let rewritten = rewrite(&content, |id| {
            if id == a {
                Some("@a".into())
            } else if id == b {
                Some("@b".into())
            } else {
                None
            }
        });
        assert_eq!(rewritten, "@a and @b");
    }
}
