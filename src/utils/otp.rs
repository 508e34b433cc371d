use rand::Rng;

/// Fenêtre de validité d'un code OTP (minutes)
pub const OTP_TTL_MINUTES: i64 = 5;

/// Génère un code de vérification numérique à 6 chiffres
/// Tirage uniforme sur 0-9 pour chaque position
pub fn generate_otp() -> String {
    let mut rng = rand::thread_rng();
    (0..6).map(|_| rng.gen_range(0..10).to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_otp_is_six_digits() {
        for _ in 0..100 {
            let code = generate_otp();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }
}
