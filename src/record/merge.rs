//! Path merge for patch writes.

use super::{Fields, Params, Record, Value};

impl Record {
    /// Return a copy of this record with `patch` merged in at `path`.
    ///
    /// An empty `path` unions `patch` into the top level (patch wins).
    /// Otherwise `path` is split on `/` and walked segment by segment; any
    /// segment that is absent or holds a leaf becomes an empty mapping, so
    /// a leaf in the way is replaced. `patch` is unioned into the mapping at
    /// the final segment. The root timestamp is not touched.
    pub fn merged(&self, path: &str, patch: &Params) -> Record {
        let mut out = self.clone();
        if path.is_empty() {
            union(&mut out.fields, patch);
        } else {
            let segments: Vec<&str> = path.split('/').collect();
            merge_at(&mut out.fields, &segments, patch);
        }
        out
    }
}

/// Free-function form of [`Record::merged`].
pub fn merge(existing: &Record, path: &str, patch: &Params) -> Record {
    existing.merged(path, patch)
}

fn union(fields: &mut Fields, patch: &Params) {
    for (k, v) in patch {
        fields.insert(k.clone(), Value::Leaf(v.clone()));
    }
}

fn merge_at(fields: &mut Fields, segments: &[&str], patch: &Params) {
    let Some((head, rest)) = segments.split_first() else {
        union(fields, patch);
        return;
    };

    let slot = fields
        .entry((*head).to_string())
        .or_insert_with(|| Value::Node(Fields::new()));
    if let Value::Leaf(_) = slot {
        *slot = Value::Node(Fields::new());
    }
    if let Value::Node(child) = slot {
        merge_at(child, rest, patch);
    }
}
