use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use pbkdf2::pbkdf2_hmac;
use rand::Rng;
use sha2::Sha256;

const ITERATIONS: u32 = 260_000;
const SALT_LENGTH: usize = 16;
const KEY_LENGTH: usize = 32;

/// Hash un mot de passe avec PBKDF2-HMAC-SHA256 (260000 itérations, salt de 16 bytes)
/// Deux appels avec le même mot de passe produisent des digests différents (salt frais)
///
/// Format produit: pbkdf2:sha256:iterations$salt$hash
pub fn hash_password(password: &str) -> String {
    // Générer un salt aléatoire de 16 bytes
    let mut salt = [0u8; SALT_LENGTH];
    rand::thread_rng().fill(&mut salt);

    // Calculer le hash PBKDF2 (infaillible avec ces paramètres)
    let mut key = [0u8; KEY_LENGTH];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), &salt, ITERATIONS, &mut key);

    let salt_b64 = URL_SAFE_NO_PAD.encode(salt);
    let hash_b64 = URL_SAFE_NO_PAD.encode(key);

    format!("pbkdf2:sha256:{}${}${}", ITERATIONS, salt_b64, hash_b64)
}

/// Vérifie un mot de passe contre un digest stocké
/// Retourne false (jamais d'erreur, jamais de panique) si le digest est malformé
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    // Parser le format: pbkdf2:sha256:iterations$salt$hash
    let parts: Vec<&str> = stored_hash.split('$').collect();
    if parts.len() != 3 {
        return false;
    }

    let header_parts: Vec<&str> = parts[0].split(':').collect();
    if header_parts.len() != 3 || header_parts[0] != "pbkdf2" || header_parts[1] != "sha256" {
        return false;
    }

    let iterations = match header_parts[2].parse::<u32>() {
        Ok(n) if n > 0 => n,
        _ => return false,
    };

    let salt = match URL_SAFE_NO_PAD.decode(parts[1]) {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };
    let expected = match URL_SAFE_NO_PAD.decode(parts[2]) {
        Ok(bytes) if !bytes.is_empty() => bytes,
        _ => return false,
    };

    // Recalculer le hash avec le même salt et les mêmes itérations
    let mut computed = vec![0u8; expected.len()];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), &salt, iterations, &mut computed);

    // Comparaison en temps constant pour éviter les timing attacks
    constant_time_eq(&computed, &expected)
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_then_verify() {
        let digest = hash_password("secret123");
        assert!(verify_password("secret123", &digest));
        assert!(!verify_password("wrong", &digest));
    }

    #[test]
    fn test_fresh_salt_each_call() {
        let d1 = hash_password("same-password");
        let d2 = hash_password("same-password");
        assert_ne!(d1, d2);
        assert!(verify_password("same-password", &d1));
        assert!(verify_password("same-password", &d2));
    }

    #[test]
    fn test_digest_format() {
        let digest = hash_password("abc");
        assert!(digest.starts_with("pbkdf2:sha256:260000$"));
        assert_eq!(digest.split('$').count(), 3);
    }

    #[test]
    fn test_malformed_digest_returns_false() {
        assert!(!verify_password("abc", ""));
        assert!(!verify_password("abc", "not-a-digest"));
        assert!(!verify_password("abc", "pbkdf2:sha256:abc$salt$hash"));
        assert!(!verify_password("abc", "pbkdf2:sha256:1000$!!!$!!!"));
        assert!(!verify_password("abc", "bcrypt:10$aaaa$bbbb"));
    }

    #[test]
    fn test_cross_password_rejected() {
        let d1 = hash_password("password-one");
        let d2 = hash_password("password-two");
        assert!(!verify_password("password-one", &d2));
        assert!(!verify_password("password-two", &d1));
    }
}
