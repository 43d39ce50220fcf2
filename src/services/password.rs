use base64::{Engine as _, engine::general_purpose::STANDARD};
use rand::rngs::OsRng;
use rand::seq::SliceRandom;
use rand::{Rng, RngCore};
use sha2::{Digest, Sha256};

/// パスワード生成に使う文字クラス
const UPPER_CHARS: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const LOWER_CHARS: &str = "abcdefghijklmnopqrstuvwxyz";
const DIGIT_CHARS: &str = "0123456789";
const SPECIAL_CHARS: &str = "!@#$%^&*()-_=+";

/// 生成パスワードの固定長
const GENERATED_PASSWORD_LEN: usize = 12;

/// ソルトのバイト長
const SALT_LEN: usize = 16;

/// 16バイトのランダムソルトを生成し、Base64でエンコードして返す
pub fn generate_salt() -> String {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    STANDARD.encode(salt)
}

/// パスワードをソルト付きでハッシュ化する
///
/// SHA-256(ソルト文字列 || パスワード) の Base64。
/// ソルトはエンコード済み文字列のまま連結する（保存形式と揃えるため）。
pub fn hash_password(password: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    STANDARD.encode(hasher.finalize())
}

/// 平文パスワードを保存済みのソルト・ハッシュと照合する
///
/// 資格情報が空のアカウント（不正データ）は常に不一致になる。
pub fn verify_password(password: &str, salt: &str, expected_hash: &str) -> bool {
    if salt.is_empty() || expected_hash.is_empty() {
        return false;
    }
    hash_password(password, salt) == expected_hash
}

/// パスワードリセット用のランダムパスワードを生成する
///
/// 12文字固定。大文字・小文字・数字・記号を最低1文字ずつ含み、
/// 残り8文字は全クラスの和集合から選ぶ。保証分の文字が先頭に
/// 固まらないよう、最後に全体をシャッフルする。
pub fn generate_random_password() -> String {
    let upper: Vec<char> = UPPER_CHARS.chars().collect();
    let lower: Vec<char> = LOWER_CHARS.chars().collect();
    let digits: Vec<char> = DIGIT_CHARS.chars().collect();
    let special: Vec<char> = SPECIAL_CHARS.chars().collect();

    let all: Vec<char> = upper
        .iter()
        .chain(lower.iter())
        .chain(digits.iter())
        .chain(special.iter())
        .copied()
        .collect();

    let mut rng = OsRng;
    let mut chars: Vec<char> = Vec::with_capacity(GENERATED_PASSWORD_LEN);

    // 各クラスから最低1文字
    chars.push(upper[rng.gen_range(0..upper.len())]);
    chars.push(lower[rng.gen_range(0..lower.len())]);
    chars.push(digits[rng.gen_range(0..digits.len())]);
    chars.push(special[rng.gen_range(0..special.len())]);

    // 残りは和集合から
    while chars.len() < GENERATED_PASSWORD_LEN {
        chars.push(all[rng.gen_range(0..all.len())]);
    }

    chars.shuffle(&mut rng);
    chars.into_iter().collect()
}

/// 6桁のOTPコードを生成する
///
/// 100000〜999999 の一様分布。再現可能な擬似乱数ではなく OS の
/// セキュア乱数源から取る。
pub fn generate_otp_code() -> String {
    let code: u32 = OsRng.gen_range(100_000..=999_999);
    code.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_roundtrip() {
        let salt = generate_salt();
        let hash = hash_password("secret", &salt);
        assert!(verify_password("secret", &salt, &hash));
        assert!(!verify_password("wrong", &salt, &hash));
    }

    #[test]
    fn test_same_password_different_salts_differ() {
        let salt_a = generate_salt();
        let salt_b = generate_salt();
        assert_ne!(salt_a, salt_b);
        assert_ne!(
            hash_password("secret", &salt_a),
            hash_password("secret", &salt_b)
        );
    }

    #[test]
    fn test_hash_is_deterministic_for_same_salt() {
        let salt = generate_salt();
        assert_eq!(hash_password("secret", &salt), hash_password("secret", &salt));
    }

    #[test]
    fn test_salt_decodes_to_16_bytes() {
        let salt = generate_salt();
        let decoded = STANDARD.decode(&salt).unwrap();
        assert_eq!(decoded.len(), 16);
    }

    #[test]
    fn test_verify_fails_closed_on_empty_credential() {
        assert!(!verify_password("secret", "", ""));
    }

    #[test]
    fn test_generated_password_composition() {
        // 1000回生成して毎回コンポジション規則を満たすこと
        for _ in 0..1000 {
            let password = generate_random_password();
            assert_eq!(password.len(), 12);
            assert!(password.chars().any(|c| UPPER_CHARS.contains(c)));
            assert!(password.chars().any(|c| LOWER_CHARS.contains(c)));
            assert!(password.chars().any(|c| DIGIT_CHARS.contains(c)));
            assert!(password.chars().any(|c| SPECIAL_CHARS.contains(c)));
        }
    }

    #[test]
    fn test_otp_code_is_6_digits_in_range() {
        for _ in 0..1000 {
            let code = generate_otp_code();
            assert_eq!(code.len(), 6);
            let value: u32 = code.parse().unwrap();
            assert!((100_000..=999_999).contains(&value));
        }
    }
}
