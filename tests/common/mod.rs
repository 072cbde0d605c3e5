#![allow(dead_code)]

use serde_json::Value;
use std::fs;
use std::path::Path;

/// Write `value` as pretty JSON at `root/relative`, creating parents
pub fn write_json(root: &Path, relative: &str, value: Value) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, serde_json::to_vec_pretty(&value).unwrap()).unwrap();
}

/// Build `src` into `out`, panicking on any build error
pub fn build(src: &Path, out: &Path) {
    apia::masterlist::build(src, out, true).unwrap();
}
