//! Turkish synonym expansion for the lexical half of hybrid retrieval.
//!
//! The table is illustrative of a Turkish IT helpdesk deployment
//! (`kb-service` serves Turkish-language ITSM tickets); a production
//! deployment would make this pluggable per locale. Here it's a fixed,
//! non-configurable static table.

use once_cell::sync::Lazy;
use std::collections::{HashMap, HashSet};

static SYNONYMS: Lazy<HashMap<&'static str, &'static [&'static str]>> = Lazy::new(|| {
    HashMap::from([
        ("sifre", &["parola", "password", "sifirlama"][..]),
        ("parola", &["sifre", "password"][..]),
        ("sifirlama", &["reset", "sifre", "yenileme"][..]),
        ("hesap", &["account", "kullanici"][..]),
        ("kilit", &["lock", "kilitli", "kilitlendi"][..]),
        ("giris", &["login", "oturum", "erisim"][..]),
        ("oturum", &["session", "giris"][..]),
        ("dogrulama", &["verification", "mfa", "2fa"][..]),
        ("mfa", &["2fa", "dogrulama", "authentication"][..]),
        ("vpn", &["uzaktan_baglanti", "remote_access"][..]),
        ("baglanti", &["connection", "network"][..]),
        ("ag", &["network", "baglanti"][..]),
        ("yazici", &["printer"][..]),
        ("yazdirma", &["printing", "yazici"][..]),
        ("eposta", &["email", "mail"][..]),
        ("posta", &["mail", "eposta"][..]),
        ("bilgisayar", &["computer", "pc"][..]),
        ("yazilim", &["software", "uygulama"][..]),
        ("uygulama", &["application", "yazilim"][..]),
        ("erisim", &["access", "giris"][..]),
        ("yetki", &["permission", "authorization"][..]),
        ("lisans", &["license"][..]),
        ("form", &["talep", "request"][..]),
        ("talep", &["request", "form"][..]),
    ])
});

static SANITIZE: Lazy<regex::Regex> =
    Lazy::new(|| regex::Regex::new(r"[^A-Za-z0-9çÇğĞıİöÖşŞüÜ ]").unwrap());

/// Tokenize, expand with synonyms, sanitize, and join into a Postgres
/// `tsquery`-compatible OR expression, e.g. `"sifre | parola | password"`.
///
/// Returns an empty string if no tokens survive (caller should then skip
/// the lexical sub-query, falling back to semantic-only retrieval).
pub fn expand_to_tsquery(query: &str) -> String {
    let mut expanded: HashSet<String> = HashSet::new();

    for raw in query.split_whitespace() {
        let token = raw.to_lowercase();
        if token.chars().count() < 2 {
            continue;
        }
        expanded.insert(token.clone());
        if let Some(syns) = SYNONYMS.get(token.as_str()) {
            for s in *syns {
                expanded.insert(s.to_string());
            }
        }
        for (key, syns) in SYNONYMS.iter() {
            if key.contains(&token) {
                expanded.insert(key.to_string());
                for s in *syns {
                    expanded.insert(s.to_string());
                }
            }
        }
    }

    let mut sanitized: Vec<String> = expanded
        .into_iter()
        .map(|t| SANITIZE.replace_all(&t, "").trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();
    sanitized.sort();
    sanitized.dedup();
    sanitized.join(" | ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_short_tokens() {
        assert_eq!(expand_to_tsquery("a b"), "");
    }

    #[test]
    fn expands_direct_synonyms() {
        let q = expand_to_tsquery("sifre");
        for term in ["sifre", "parola", "password", "sifirlama"] {
            assert!(q.contains(term), "missing {term} in {q}");
        }
    }

    #[test]
    fn expands_via_containing_key() {
        // "sifr" is a substring of "sifre" and "sifirlama" keys.
        let q = expand_to_tsquery("sifr");
        assert!(q.contains("sifre"));
    }

    #[test]
    fn sanitizes_and_dedupes() {
        let q = expand_to_tsquery("vpn vpn");
        let terms: Vec<&str> = q.split(" | ").collect();
        let unique: HashSet<&&str> = terms.iter().collect();
        assert_eq!(terms.len(), unique.len());
    }
}
