//! Object store fixtures

use prefix_retriever::MemoryStore;

/// Partitioned dataset: `year=YYYY/month=MM/part-N.json`, plus a manifest
/// at the root and a zero-byte folder marker
pub fn partitioned_dataset() -> MemoryStore {
    let mut store = MemoryStore::new()
        .with_object("dataset/_manifest.json", r#"{"version":1}"#)
        .with_object("dataset/year=2024/", "");
    for month in 1..=3 {
        for part in 0..2 {
            let key = format!("dataset/year=2024/month={month:02}/part-{part}.json");
            let body = format!(r#"{{"month":{month},"part":{part}}}"#);
            store.insert(key, body);
        }
    }
    store
}

/// Keys in [`partitioned_dataset`] that hold data (everything except the marker)
pub fn partitioned_dataset_keys() -> Vec<String> {
    let mut keys = vec!["dataset/_manifest.json".to_string()];
    for month in 1..=3 {
        for part in 0..2 {
            keys.push(format!("dataset/year=2024/month={month:02}/part-{part}.json"));
        }
    }
    keys.sort();
    keys
}

/// Wide and deep tree with `fanout` subfolders and files per level
pub fn wide_tree(root: &str, depth: usize, fanout: usize) -> (MemoryStore, usize) {
    let mut store = MemoryStore::new();
    let mut count = 0;
    let mut level = vec![root.to_string()];
    for current in 0..=depth {
        let mut next = Vec::new();
        for prefix in &level {
            for f in 0..fanout {
                store.insert(format!("{prefix}obj-{f}"), vec![b'x'; f + 1]);
                count += 1;
            }
            if current < depth {
                next.extend((0..fanout).map(|d| format!("{prefix}sub-{d}/")));
            }
        }
        level = next;
    }
    (store, count)
}
