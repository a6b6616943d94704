// leafsql: SQL access to the Leaf agricultural data API
// Copyright 2026 leafsql contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::utils::url_encode;
use std::collections::BTreeMap;

/// Multimap for string key and string value
pub type Multimap = multimap::MultiMap<String, String>;

pub trait MultimapExt {
    /// Adds a key-value pair to the multimap
    fn add<K: Into<String>, V: Into<String>>(&mut self, key: K, value: V);

    /// Adds a multimap to the current multimap
    fn add_multimap(&mut self, other: Multimap);

    /// Converts multimap to HTTP query string in insertion order per key
    fn to_query_string(&self) -> String;

    /// Converts multimap to canonical query string: keys sorted, values kept in
    /// insertion order so repeated parameters preserve their meaning.
    fn get_canonical_query_string(&self) -> String;

    /// Sorted `(key, value)` pairs, the same order as the canonical query string.
    fn canonical_pairs(&self) -> Vec<(&str, &str)>;
}

impl MultimapExt for Multimap {
    fn add<K: Into<String>, V: Into<String>>(&mut self, key: K, value: V) {
        self.insert(key.into(), value.into());
    }

    fn add_multimap(&mut self, other: Multimap) {
        for (key, values) in other.into_iter() {
            self.insert_many(key, values);
        }
    }

    fn to_query_string(&self) -> String {
        let mut query = String::new();
        for (key, values) in self.iter_all() {
            for value in values {
                if !query.is_empty() {
                    query.push('&');
                }
                query.push_str(&url_encode(key));
                query.push('=');
                query.push_str(&url_encode(value));
            }
        }
        query
    }

    fn get_canonical_query_string(&self) -> String {
        let mut query = String::new();
        for (key, value) in self.canonical_pairs() {
            if !query.is_empty() {
                query.push('&');
            }
            query.push_str(&url_encode(key));
            query.push('=');
            query.push_str(&url_encode(value));
        }
        query
    }

    fn canonical_pairs(&self) -> Vec<(&str, &str)> {
        let mut sorted: BTreeMap<&str, &[String]> = BTreeMap::new();
        for (key, values) in self.iter_all() {
            sorted.insert(key.as_str(), values.as_slice());
        }
        sorted
            .into_iter()
            .flat_map(|(k, vs)| vs.iter().map(move |v| (k, v.as_str())))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_query_string_sorted() {
        let mut m = Multimap::new();
        m.add("size", "100");
        m.add("provider", "JohnDeere");
        m.add("page", "0");
        assert_eq!(
            m.get_canonical_query_string(),
            "page=0&provider=JohnDeere&size=100"
        );
    }

    #[test]
    fn test_canonical_query_string_keeps_repeated_value_order() {
        let mut m = Multimap::new();
        m.add("sort", "startTime,desc");
        m.add("sort", "id,asc");
        m.add("a", "x y");
        assert_eq!(
            m.get_canonical_query_string(),
            "a=x%20y&sort=startTime%2Cdesc&sort=id%2Casc"
        );
    }

    #[test]
    fn test_add_multimap() {
        let mut a = Multimap::new();
        a.add("k", "1");
        let mut b = Multimap::new();
        b.add("k", "2");
        b.add("j", "3");
        a.add_multimap(b);
        assert_eq!(a.get_vec("k").unwrap(), &vec!["1".to_string(), "2".to_string()]);
        assert_eq!(a.get("j").map(String::as_str), Some("3"));
    }
}
