//! SG-016: BLAKE3 fingerprints for generated steps and protocols.

use super::command::Command;

/// Hash a string. Returns `"blake3:{hex}"`.
pub fn hash_string(s: &str) -> String {
    format!("blake3:{}", blake3::hash(s.as_bytes()).to_hex())
}

/// Hash a step's command list as serialized JSON.
pub fn hash_commands(commands: &[Command]) -> Result<String, String> {
    let json = serde_json::to_string(commands)
        .map_err(|e| format!("cannot serialize commands: {}", e))?;
    Ok(hash_string(&json))
}

/// Combine step fingerprints, in order, into one protocol fingerprint.
pub fn composite_hash(components: &[&str]) -> String {
    let mut hasher = blake3::Hasher::new();
    for c in components {
        hasher.update(c.as_bytes());
        hasher.update(b"\0");
    }
    format!("blake3:{}", hasher.finalize().to_hex())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::command::{DelayParams, ModuleOnlyParams, Wait};

    #[test]
    fn test_sg016_hash_string_deterministic() {
        let h1 = hash_string("hello");
        let h2 = hash_string("hello");
        assert_eq!(h1, h2);
        assert!(h1.starts_with("blake3:"));
        assert_eq!(h1.len(), 7 + 64);
    }

    #[test]
    fn test_sg016_hash_commands_changes_with_params() {
        let a = vec![Command::Delay(DelayParams {
            wait: Wait::Seconds(1.0),
            message: None,
        })];
        let b = vec![Command::Delay(DelayParams {
            wait: Wait::Seconds(2.0),
            message: None,
        })];
        assert_ne!(hash_commands(&a).unwrap(), hash_commands(&b).unwrap());
        assert_eq!(hash_commands(&a).unwrap(), hash_commands(&a.clone()).unwrap());
    }

    #[test]
    fn test_sg016_empty_command_list() {
        assert_eq!(hash_commands(&[]).unwrap(), hash_string("[]"));
    }

    #[test]
    fn test_sg016_composite_order_matters() {
        let ab = composite_hash(&["a", "b"]);
        let ba = composite_hash(&["b", "a"]);
        assert_ne!(ab, ba);
        let cmd = Command::OpenLid(ModuleOnlyParams {
            module: "tc".to_string(),
        });
        assert!(hash_commands(&[cmd]).unwrap().starts_with("blake3:"));
    }
}
