// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// 计算 JSON 载荷的稳定内容哈希
///
/// 对象键递归排序后序列化，再取 SHA-256 的小写十六进制
///
/// # 参数
///
/// * `payload` - 原始载荷
///
/// # 返回值
///
/// 64 位十六进制字符串
pub fn content_hash(payload: &Value) -> String {
    let canonical = canonicalize(payload);
    // Value serialization cannot fail for a tree of plain JSON values
    let bytes = serde_json::to_vec(&canonical).unwrap_or_default();
    hex::encode(Sha256::digest(&bytes))
}

/// 递归排序对象键
pub fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut sorted = Map::with_capacity(map.len());
            for key in keys {
                sorted.insert(key.clone(), canonicalize(&map[key]));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}
