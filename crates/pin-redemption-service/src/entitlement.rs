//! 授权表
//!
//! 产品类别到应用集合的静态映射。进程启动时从配置构建一次，之后只读，
//! 通过 Arc 在并发请求间共享，无需加锁。未配置的产品类别默认拒绝。

use std::collections::{HashMap, HashSet};

/// 授权表
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntitlementTable {
    grants: HashMap<String, HashSet<String>>,
}

impl EntitlementTable {
    /// 从 产品类别 -> 应用列表 的映射构建
    pub fn new<I, K, V, A>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: IntoIterator<Item = A>,
        A: Into<String>,
    {
        let mut grants: HashMap<String, HashSet<String>> = HashMap::new();
        for (product_class, apps) in entries {
            grants
                .entry(product_class.into())
                .or_default()
                .extend(apps.into_iter().map(Into::into));
        }
        Self { grants }
    }

    /// 产品类别是否可以解锁指定应用
    pub fn is_allowed(&self, product_class: &str, application_id: &str) -> bool {
        self.grants
            .get(product_class)
            .is_some_and(|apps| apps.contains(application_id))
    }

    /// 已配置的产品类别数量
    pub fn len(&self) -> usize {
        self.grants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grants.is_empty()
    }
}

impl From<&HashMap<String, Vec<String>>> for EntitlementTable {
    fn from(config: &HashMap<String, Vec<String>>) -> Self {
        Self::new(
            config
                .iter()
                .map(|(class, apps)| (class.clone(), apps.iter().cloned())),
        )
    }
}
