use std::path::Path;

use serde_yaml::Value;

use crate::errors::{Result, SpecError};
use crate::model::Instruction;

/// Load the ordered instruction list from a specification file.
pub fn load_instructions(path: &Path) -> Result<Vec<Instruction>> {
    let source = std::fs::read_to_string(path).map_err(|err| SpecError::Load {
        path: path.display().to_string(),
        reason: err.to_string(),
    })?;
    parse_instructions(&source, &path.display().to_string())
}

/// Parse a specification document: a YAML sequence of instruction nodes.
pub fn parse_instructions(source: &str, origin: &str) -> Result<Vec<Instruction>> {
    let load_error = |reason: String| SpecError::Load {
        path: origin.to_string(),
        reason,
    };

    let document: Value =
        serde_yaml::from_str(source).map_err(|err| load_error(err.to_string()))?;

    match document {
        Value::Sequence(items) if !items.is_empty() => {
            Ok(items.into_iter().map(Instruction::new).collect())
        }
        Value::Sequence(_) | Value::Null => Err(load_error("no instructions found".to_string())),
        _ => Err(load_error(
            "expected a sequence of instructions at the top level".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_instruction_sequence() {
        let instructions = parse_instructions(
            "- Individual: 10\n- Event: 2-4\n  fields:\n    title: Gala\n",
            "inline",
        )
        .expect("instructions");
        assert_eq!(instructions.len(), 2);
    }

    #[test]
    fn empty_document_is_fatal() {
        assert!(matches!(
            parse_instructions("", "inline"),
            Err(SpecError::Load { .. })
        ));
        assert!(matches!(
            parse_instructions("Individual: 10", "inline"),
            Err(SpecError::Load { .. })
        ));
    }
}
