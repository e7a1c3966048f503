//! Cross-product expansion of variant dimensions.
//!
//! A test's `variants` field is an ordered list of independent dimensions;
//! each dimension maps option names to partial parameter overlays. Every
//! combination picks exactly one option per dimension, so a test with
//! dimensions of sizes k1..kN expands into k1*...*kN concrete instances.

use serde_json::Value;

use crate::error::GenError;
use crate::models::Params;

const VARIANTS_SHAPE_HELP: &str = "variants must be specified as a list of variant dimensions, e.g.:
  variants:
  - dimension1-variant1:
      param: ...
    dimension1-variant2:
      param: ...
  - dimension2-variant1:
      param: ...
    dimension2-variant2:
      param: ...";

/// Expand a test definition into one instance per variant combination.
///
/// Enumeration is depth-first over the dimensions in declared order, so the
/// first dimension varies slowest. Each produced instance carries a
/// `variant_names` list recording the option chosen per dimension, in order.
/// A test without `variants` expands to a single instance with an empty
/// `variant_names`.
pub fn expand_variants(test: &Params) -> Result<Vec<Params>, GenError> {
    let dimensions: Vec<&Params> = match test.get("variants") {
        None => Vec::new(),
        Some(Value::Array(dims)) => dims
            .iter()
            .map(|dim| dim.as_object().ok_or_else(|| GenError::definition(VARIANTS_SHAPE_HELP)))
            .collect::<Result<_, _>>()?,
        Some(_) => return Err(GenError::definition(VARIANTS_SHAPE_HELP)),
    };

    let mut instances = Vec::new();
    let mut selection: Vec<(&String, &Value)> = Vec::new();
    expand_recursive(test, &dimensions, &mut selection, &mut instances)?;
    Ok(instances)
}

fn expand_recursive<'t>(
    original: &Params,
    dimensions: &[&'t Params],
    selection: &mut Vec<(&'t String, &'t Value)>,
    instances: &mut Vec<Params>,
) -> Result<(), GenError> {
    if selection.len() == dimensions.len() {
        // One option picked per dimension: materialize an instance.
        let mut instance = original.clone();
        let mut variant_names = Vec::new();
        for (option_name, overlay) in selection.iter() {
            match overlay {
                Value::Object(fields) => {
                    for (key, value) in fields {
                        instance.insert(key.clone(), value.clone());
                    }
                }
                // An option with no parameters of its own only contributes
                // its name.
                Value::Null => {}
                _ => {
                    return Err(GenError::definition(format!(
                        "variant option \"{option_name}\" must map to a parameter mapping"
                    )))
                }
            }
            variant_names.push(Value::String((*option_name).clone()));
        }
        // Expose the chosen option names so definitions can build better
        // test names from them.
        instance.insert("variant_names".to_string(), Value::Array(variant_names));
        instances.push(instance);
        return Ok(());
    }

    let dimension = dimensions[selection.len()];
    for option in dimension.iter() {
        selection.push(option);
        expand_recursive(original, dimensions, selection, instances)?;
        selection.pop();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn test_params(yaml: &str) -> Params {
        let value: Value = serde_yaml::from_str(yaml).unwrap();
        value.as_object().unwrap().clone()
    }

    #[test]
    fn no_variants_yields_single_instance() {
        let test = test_params("name: t\ncode: x");
        let instances = expand_variants(&test).unwrap();
        assert_eq!(instances.len(), 1);
        assert_eq!(instances[0]["name"], json!("t"));
        assert_eq!(instances[0]["variant_names"], json!([]));
    }

    #[test]
    fn cross_product_of_two_dimensions() {
        let test = test_params(
            "name: t
variants:
- first:
    a: 1
  second:
    a: 2
- red:
    b: red
  blue:
    b: blue",
        );
        let instances = expand_variants(&test).unwrap();
        assert_eq!(instances.len(), 4);
        let names: Vec<_> =
            instances.iter().map(|i| i["variant_names"].clone()).collect();
        assert_eq!(
            names,
            vec![
                json!(["first", "red"]),
                json!(["first", "blue"]),
                json!(["second", "red"]),
                json!(["second", "blue"]),
            ]
        );
        assert_eq!(instances[0]["a"], json!(1));
        assert_eq!(instances[0]["b"], json!("red"));
        assert_eq!(instances[3]["a"], json!(2));
        assert_eq!(instances[3]["b"], json!("blue"));
    }

    #[test]
    fn later_dimensions_override_earlier_overlays() {
        let test = test_params(
            "name: t
variants:
- a:
    param: one
- b:
    param: two",
        );
        let instances = expand_variants(&test).unwrap();
        assert_eq!(instances.len(), 1);
        assert_eq!(instances[0]["param"], json!("two"));
    }

    #[test]
    fn variant_count_is_product_of_dimension_sizes() {
        let test = test_params(
            "name: t
variants:
- a: {}
  b: {}
  c: {}
- x: {}
  y: {}",
        );
        let instances = expand_variants(&test).unwrap();
        assert_eq!(instances.len(), 6);
        for instance in &instances {
            assert_eq!(instance["variant_names"].as_array().unwrap().len(), 2);
        }
    }

    #[test]
    fn malformed_variants_is_a_definition_error() {
        let test = test_params("name: t\nvariants: not-a-list");
        let err = expand_variants(&test).unwrap_err();
        assert!(matches!(err, GenError::Definition(_)));

        let test = test_params("name: t\nvariants:\n- just-a-string");
        let err = expand_variants(&test).unwrap_err();
        assert!(matches!(err, GenError::Definition(_)));
    }
}
