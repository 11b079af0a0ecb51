//! JSON fabric loading.

use crate::error::FabricError;
use crate::types::Fabric;
use std::path::Path;

/// Loads and validates a fabric from a JSON file.
pub fn load_fabric(path: &Path) -> Result<Fabric, FabricError> {
    let content = std::fs::read_to_string(path)?;
    fabric_from_json(&content)
}

/// Parses and validates a fabric from a JSON string.
pub fn fabric_from_json(content: &str) -> Result<Fabric, FabricError> {
    let fabric: Fabric =
        serde_json::from_str(content).map_err(|e| FabricError::ParseError(e.to_string()))?;
    fabric.validate()?;
    Ok(fabric)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{InstanceKind, Location};
    use std::io::Write;

    const SMALL: &str = r#"{
        "blocks": [{
            "location": {"row": 0, "col": 0},
            "instances": [
                {"name": "alu", "kind": "functional-unit", "input_ports": ["a"],
                 "output_ports": ["out"], "ops": ["add", "const"]},
                {"name": "r", "kind": "register", "input_ports": ["in"], "output_ports": ["out"]}
            ],
            "muxes": [{"name": "m", "input_ports": ["in0", "in1"], "output_port": "out"}],
            "operand_ports": [{"name": "pa", "input_port": "in", "output_port": "out", "operand": 0}]
        }],
        "ties": [
            {"src": {"location": {"row": 0, "col": 0}, "element": "pa", "port": "out"},
             "dst": {"location": {"row": 0, "col": 0}, "element": "alu", "port": "a"}},
            {"src": {"location": {"row": 0, "col": 0}, "element": "alu", "port": "out"},
             "dst": {"location": {"row": 0, "col": 0}, "element": "m", "port": "in0"}}
        ]
    }"#;

    #[test]
    fn parse_small_fabric() {
        let fabric = fabric_from_json(SMALL).unwrap();
        assert_eq!(fabric.blocks.len(), 1);
        assert_eq!(fabric.ties.len(), 2);
        assert_eq!(fabric.instance_count(InstanceKind::FunctionalUnit), 1);
        let block = fabric.block(Location::new(0, 0)).unwrap();
        assert!(block.instances[0].ops.contains("const"));
        assert!(block.instances[1].ops.is_empty());
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SMALL.as_bytes()).unwrap();
        let fabric = load_fabric(file.path()).unwrap();
        assert_eq!(fabric.blocks[0].muxes[0].name, "m");
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_fabric(Path::new("/nonexistent/fabric.json")).unwrap_err();
        assert!(matches!(err, FabricError::IoError(_)));
    }

    #[test]
    fn malformed_json_is_parse_error() {
        let err = fabric_from_json("{\"blocks\": [").unwrap_err();
        assert!(matches!(err, FabricError::ParseError(_)));
    }

    #[test]
    fn invalid_structure_is_reported() {
        let bad = SMALL.replace(
            "\"element\": \"m\", \"port\": \"in0\"",
            "\"element\": \"m\", \"port\": \"nope\"",
        );
        let err = fabric_from_json(&bad).unwrap_err();
        assert!(matches!(err, FabricError::BadPort(_)));
    }
}
