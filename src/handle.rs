// 该文件是 Yeguang （夜光） 项目的一部分。
// src/handle.rs - 原生句柄表
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use std::{
  collections::HashMap,
  sync::{
    Arc, Mutex, MutexGuard,
    atomic::{AtomicI64, Ordering},
  },
};

use tracing::{debug, warn};

/// 失败时返回给调用方的句柄
pub const INVALID_HANDLE: i64 = 0;

pub type Entry<T> = Arc<Mutex<T>>;

/// 不透明句柄到对象的映射，句柄在进程内不会复用
pub struct HandleTable<T> {
  next: AtomicI64,
  entries: Mutex<HashMap<i64, Entry<T>>>,
}

impl<T> Default for HandleTable<T> {
  fn default() -> Self {
    Self::new()
  }
}

impl<T> HandleTable<T> {
  pub fn new() -> Self {
    Self {
      next: AtomicI64::new(1),
      entries: Mutex::new(HashMap::new()),
    }
  }

  fn entries(&self) -> MutexGuard<'_, HashMap<i64, Entry<T>>> {
    // 表内只有插入和删除，持锁线程 panic 不会留下不一致的状态
    self.entries.lock().unwrap_or_else(|e| e.into_inner())
  }

  pub fn insert(&self, value: T) -> i64 {
    let handle = self.next.fetch_add(1, Ordering::Relaxed);
    self.entries().insert(handle, Arc::new(Mutex::new(value)));
    debug!("分配句柄 {}", handle);
    handle
  }

  pub fn get(&self, handle: i64) -> Option<Entry<T>> {
    if handle == INVALID_HANDLE {
      return None;
    }
    let entry = self.entries().get(&handle).cloned();
    if entry.is_none() {
      warn!("未知句柄 {}", handle);
    }
    entry
  }

  /// 移除句柄，返回被移除的对象；未知句柄返回 None
  pub fn remove(&self, handle: i64) -> Option<Entry<T>> {
    if handle == INVALID_HANDLE {
      return None;
    }
    let entry = self.entries().remove(&handle);
    match entry {
      Some(_) => debug!("释放句柄 {}", handle),
      None => warn!("重复释放或未知句柄 {}", handle),
    }
    entry
  }

  pub fn len(&self) -> usize {
    self.entries().len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

/// 锁住单个条目；条目锁中毒时仍返回内部对象，由对象自身的状态决定是否可用
pub fn lock<T>(entry: &Entry<T>) -> MutexGuard<'_, T> {
  entry.lock().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn handles_are_non_zero_and_unique() {
    let table = HandleTable::new();
    let a = table.insert("a");
    let b = table.insert("b");
    assert_ne!(a, INVALID_HANDLE);
    assert_ne!(a, b);
    assert_eq!(*lock(&table.get(a).unwrap()), "a");
    assert_eq!(table.len(), 2);
  }

  #[test]
  fn zero_and_unknown_handles_resolve_to_nothing() {
    let table: HandleTable<u32> = HandleTable::new();
    assert!(table.get(INVALID_HANDLE).is_none());
    assert!(table.get(42).is_none());
    assert!(table.remove(INVALID_HANDLE).is_none());
  }

  #[test]
  fn double_remove_is_harmless() {
    let table = HandleTable::new();
    let h = table.insert(7u32);
    assert!(table.remove(h).is_some());
    assert!(table.remove(h).is_none());
    assert!(table.get(h).is_none());
    assert!(table.is_empty());

    // 释放后的句柄不会被再次分配
    let next = table.insert(8u32);
    assert_ne!(next, h);
  }

  #[test]
  fn entry_outlives_removal_while_in_use() {
    let table = HandleTable::new();
    let h = table.insert(vec![1, 2, 3]);
    let entry = table.get(h).unwrap();
    table.remove(h);
    assert_eq!(lock(&entry).len(), 3);
  }
}
