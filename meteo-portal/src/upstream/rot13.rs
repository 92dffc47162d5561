//! Encodage ROT-13 du jeton de session
//!
//! Le cookie `mfsession` est renvoyé par l'amont sous forme ROT-13 du jeton
//! attendu dans l'en-tête `Authorization`. Ce n'est pas un chiffrement.

/// Décale de 13 rangs chaque lettre ASCII ; les autres octets sont inchangés
pub fn rot13_bytes(input: &[u8]) -> Vec<u8> {
    input
        .iter()
        .map(|&b| match b {
            b'a'..=b'z' => (b - b'a' + 13) % 26 + b'a',
            b'A'..=b'Z' => (b - b'A' + 13) % 26 + b'A',
            _ => b,
        })
        .collect()
}

/// ROT-13 d'une chaîne ; seuls des octets ASCII sont modifiés donc
/// l'UTF-8 reste valide
pub fn rot13(input: &str) -> String {
    input
        .chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' => rot13_bytes(&[c as u8])[0] as char,
            _ => c,
        })
        .collect()
}
