//! Deep-merge of two JSON config trees.

use serde_json::Value;

/// Merge `overlay` onto `base` in place.
///
/// Object keys are unioned; a key present in both is taken from `overlay`,
/// recursing if both sides are objects. Arrays in `overlay` fully replace the
/// corresponding array in `base` rather than being concatenated or merged
/// element-wise. Any other type mismatch also falls back to replacement.
pub fn deep_merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(base_value) => deep_merge(base_value, overlay_value),
                    None => {
                        base_map.insert(key, overlay_value);
                    }
                }
            }
        }
        (base_slot, overlay_value) => {
            *base_slot = overlay_value;
        }
    }
}
