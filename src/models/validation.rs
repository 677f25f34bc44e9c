//! Field validators shared by request types

use validator::ValidationError;

/// Strip punctuation from a CPF (`123.456.789-09` -> `12345678909`)
pub fn normalize_cpf(cpf: &str) -> String {
    cpf.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Check the two CPF verification digits
pub fn is_valid_cpf(cpf: &str) -> bool {
    let digits: Vec<u32> = normalize_cpf(cpf)
        .chars()
        .filter_map(|c| c.to_digit(10))
        .collect();

    if digits.len() != 11 || digits.iter().all(|d| *d == digits[0]) {
        return false;
    }

    let check_digit = |len: usize| -> u32 {
        let sum: u32 = digits[..len]
            .iter()
            .enumerate()
            .map(|(i, d)| d * (len as u32 + 1 - i as u32))
            .sum();
        match (sum * 10) % 11 {
            10 => 0,
            r => r,
        }
    };

    check_digit(9) == digits[9] && check_digit(10) == digits[10]
}

pub fn validate_cpf(cpf: &str) -> Result<(), ValidationError> {
    if is_valid_cpf(cpf) {
        Ok(())
    } else {
        let mut error = ValidationError::new("cpf");
        error.message = Some("Invalid CPF".into());
        Err(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_cpf_with_and_without_punctuation() {
        assert!(is_valid_cpf("529.982.247-25"));
        assert!(is_valid_cpf("52998224725"));
        assert!(is_valid_cpf("11144477735"));
    }

    #[test]
    fn test_invalid_cpf() {
        assert!(!is_valid_cpf("52998224724"));
        assert!(!is_valid_cpf("00000000000"));
        assert!(!is_valid_cpf("1234"));
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize_cpf("111.444.777-35"), "11144477735");
    }
}
