// src/services/client.rs

//! Schedule client.
//!
//! The caller-facing facade: seven read-only queries, each wrapped in the
//! cache-aside layer. Reference lists use the reference TTL, schedules the
//! schedule TTL.

use std::sync::Arc;
use std::time::Duration;

use crate::cache::CacheAside;
use crate::error::Result;
use crate::models::{Config, Course, Department, Faculty, Group, ListEntity, Schedule, Teacher};
use crate::services::fetcher::{HttpUpstream, Params, Upstream};
use crate::services::lists::decode_list;
use crate::services::schedule::ScheduleDecoder;
use crate::storage;

pub const FACULTIES: &str = "get_faculties_list";
pub const COURSES: &str = "get_courses_list";
pub const GROUPS: &str = "get_groups_list";
pub const DEPARTMENTS: &str = "get_departments_list";
pub const TEACHERS: &str = "get_teachers_list";
pub const STUDENT_SCHEDULE: &str = "get_student_schedule";
pub const TEACHER_SCHEDULE: &str = "get_teacher_schedule";

const NO_ARGS: [i64; 0] = [];

/// Cached access to faculties, courses, groups, departments, teachers and
/// schedules.
pub struct ScheduleClient {
    upstream: Arc<dyn Upstream>,
    cache: CacheAside,
    decoder: ScheduleDecoder,
    reference_ttl: Option<Duration>,
    schedule_ttl: Option<Duration>,
}

impl ScheduleClient {
    pub fn new(
        upstream: Arc<dyn Upstream>,
        cache: CacheAside,
        reference_ttl: Option<Duration>,
        schedule_ttl: Option<Duration>,
    ) -> Result<Self> {
        Ok(Self {
            upstream,
            cache,
            decoder: ScheduleDecoder::new()?,
            reference_ttl,
            schedule_ttl,
        })
    }

    /// Build an HTTP-backed client with the store selected in `config`.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let upstream = Arc::new(HttpUpstream::new(config.upstream.clone())?);
        let store = storage::open(&config.cache).await?;
        let cache = CacheAside::new(store, config.cache.ttl_policy);
        Self::new(
            upstream,
            cache,
            config.cache.reference_ttl(),
            config.cache.schedule_ttl(),
        )
    }

    pub fn cache(&self) -> &CacheAside {
        &self.cache
    }

    pub async fn faculties(&self) -> Result<Vec<Faculty>> {
        self.cache
            .get_or_fetch(FACULTIES, &NO_ARGS, self.reference_ttl, || {
                self.fetch_list::<Faculty>(Vec::new())
            })
            .await
    }

    pub async fn courses(&self, faculty_id: i64) -> Result<Vec<Course>> {
        self.cache
            .get_or_fetch(COURSES, &[faculty_id], self.reference_ttl, || {
                self.fetch_list::<Course>(vec![("facult", faculty_id.to_string())])
            })
            .await
    }

    pub async fn groups(&self, faculty_id: i64, course_id: i64) -> Result<Vec<Group>> {
        self.cache
            .get_or_fetch(GROUPS, &[faculty_id, course_id], self.reference_ttl, || {
                self.fetch_list::<Group>(vec![
                    ("facult", faculty_id.to_string()),
                    ("potok", course_id.to_string()),
                ])
            })
            .await
    }

    pub async fn departments(&self, faculty_id: i64) -> Result<Vec<Department>> {
        self.cache
            .get_or_fetch(DEPARTMENTS, &[faculty_id], self.reference_ttl, || {
                self.fetch_list::<Department>(vec![("facult", faculty_id.to_string())])
            })
            .await
    }

    pub async fn teachers(&self, department_id: i64) -> Result<Vec<Teacher>> {
        self.cache
            .get_or_fetch(TEACHERS, &[department_id], self.reference_ttl, || {
                self.fetch_list::<Teacher>(vec![("kafedra", department_id.to_string())])
            })
            .await
    }

    pub async fn student_schedule(&self, group_id: i64) -> Result<Schedule> {
        self.cache
            .get_or_fetch(STUDENT_SCHEDULE, &[group_id], self.schedule_ttl, || {
                self.fetch_schedule(vec![("who", "1".to_string()), ("group", group_id.to_string())])
            })
            .await
    }

    pub async fn teacher_schedule(&self, teacher_id: i64) -> Result<Schedule> {
        self.cache
            .get_or_fetch(TEACHER_SCHEDULE, &[teacher_id], self.schedule_ttl, || {
                self.fetch_schedule(vec![("who", "2".to_string()), ("prep", teacher_id.to_string())])
            })
            .await
    }

    async fn fetch_list<T: ListEntity>(&self, extra: Params) -> Result<Vec<T>> {
        let payload = self.upstream.fetch_list(T::REQUEST, T::WHO, &extra).await?;
        let items: Vec<T> = decode_list(&payload, T::FIELD_MAP)?;
        log::info!("Fetched {} '{}' entries", items.len(), T::REQUEST);
        Ok(items)
    }

    async fn fetch_schedule(&self, params: Params) -> Result<Schedule> {
        let html = self.upstream.fetch_schedule(&params).await?;
        let schedule = self.decoder.decode(&html)?;
        log::info!(
            "Fetched schedule {:?}: {} days, {} records",
            params,
            schedule.len(),
            schedule.record_count()
        );
        Ok(schedule)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::error::AppError;
    use crate::models::TtlPolicy;
    use crate::storage::{CacheStore, MemoryStore};

    const FACULTY_PAYLOAD: &str =
        "{'list': [{'id': '3', 'title': 'Engineering', 'name': 'ENG'}, {'id': 7, 'title': 'Law', 'name': 'LAW'}]}";

    const GROUP_PAYLOAD: &str = "{'list': [{'id': 11, 'name': '20PI-1'}]}";

    const TEACHER_PAYLOAD: &str =
        "{'list': [{'id': 42, 'title': 'Ivanov Ivan Ivanovich', 'name': 'Ivanov I.I.'}]}";

    const SCHEDULE_HTML: &str = r#"<table>
<tr><td>Date</td><td>1</td><td>2</td></tr>
<tr><td>01.09.2023(Пт)</td>
<td pare_id="2"><span title="Math">Math</span><span class="aud">101</span><span class="p">Petrov</span></td>
<td pare_id="1"><span title="Physics">Physics</span><span class="aud">202</span><span class="p">Sidorov</span></td>
</tr>
</table>"#;

    #[derive(Default)]
    struct FakeUpstream {
        list_calls: AtomicUsize,
        schedule_calls: AtomicUsize,
        last_list: Mutex<Option<(String, u32, Params)>>,
        last_schedule: Mutex<Option<Params>>,
        fail: bool,
    }

    #[async_trait]
    impl Upstream for FakeUpstream {
        async fn fetch_list(&self, request: &str, who: u32, extra: &Params) -> Result<String> {
            self.list_calls.fetch_add(1, Ordering::SeqCst);
            *self.last_list.lock().unwrap() = Some((request.to_string(), who, extra.clone()));
            if self.fail {
                return Err(AppError::Status {
                    url: "http://upstream".to_string(),
                    status: 503,
                });
            }
            Ok(match request {
                "facult" => FACULTY_PAYLOAD,
                "group" => GROUP_PAYLOAD,
                "prep" => TEACHER_PAYLOAD,
                _ => "{'list': []}",
            }
            .to_string())
        }

        async fn fetch_schedule(&self, params: &Params) -> Result<String> {
            self.schedule_calls.fetch_add(1, Ordering::SeqCst);
            *self.last_schedule.lock().unwrap() = Some(params.clone());
            Ok(SCHEDULE_HTML.to_string())
        }
    }

    fn client_with(upstream: Arc<FakeUpstream>) -> (ScheduleClient, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let cache = CacheAside::new(store.clone(), TtlPolicy::Atomic);
        let client = ScheduleClient::new(
            upstream,
            cache,
            Some(Duration::from_secs(8 * 3600)),
            Some(Duration::from_secs(3600)),
        )
        .unwrap();
        (client, store)
    }

    #[tokio::test]
    async fn test_faculties_decoded_and_cached() {
        let upstream = Arc::new(FakeUpstream::default());
        let (client, store) = client_with(upstream.clone());

        let first = client.faculties().await.unwrap();
        let second = client.faculties().await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].id, 3);
        assert_eq!(first[0].name, "Engineering");
        assert_eq!(first[0].short_name.as_deref(), Some("ENG"));
        assert_eq!(upstream.list_calls.load(Ordering::SeqCst), 1);
        assert!(store.exists("get_faculties_list:[]").await.unwrap());

        let (request, who, extra) = upstream.last_list.lock().unwrap().clone().unwrap();
        assert_eq!(request, "facult");
        assert_eq!(who, 1);
        assert!(extra.is_empty());
    }

    #[tokio::test]
    async fn test_groups_key_and_params() {
        let upstream = Arc::new(FakeUpstream::default());
        let (client, store) = client_with(upstream.clone());

        let groups = client.groups(3, 2).await.unwrap();
        assert_eq!(groups[0].name, "20PI-1");
        assert!(store.exists("get_groups_list:[3,2]").await.unwrap());

        let (request, who, extra) = upstream.last_list.lock().unwrap().clone().unwrap();
        assert_eq!(request, "group");
        assert_eq!(who, 1);
        assert_eq!(
            extra,
            vec![("facult", "3".to_string()), ("potok", "2".to_string())]
        );

        client.groups(2, 3).await.unwrap();
        assert_eq!(upstream.list_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_teachers_use_department_selector() {
        let upstream = Arc::new(FakeUpstream::default());
        let (client, _) = client_with(upstream.clone());

        let teachers = client.teachers(9).await.unwrap();
        assert_eq!(teachers[0].id, 42);
        assert_eq!(teachers[0].short_name.as_deref(), Some("Ivanov I.I."));

        let (request, who, extra) = upstream.last_list.lock().unwrap().clone().unwrap();
        assert_eq!(request, "prep");
        assert_eq!(who, 2);
        assert_eq!(extra, vec![("kafedra", "9".to_string())]);
    }

    #[tokio::test]
    async fn test_departments_use_who_two() {
        let upstream = Arc::new(FakeUpstream::default());
        let (client, _) = client_with(upstream.clone());

        assert!(client.departments(3).await.unwrap().is_empty());
        let (request, who, _) = upstream.last_list.lock().unwrap().clone().unwrap();
        assert_eq!(request, "kafedra");
        assert_eq!(who, 2);
    }

    #[tokio::test]
    async fn test_student_schedule_sorted_and_cached() {
        let upstream = Arc::new(FakeUpstream::default());
        let (client, _) = client_with(upstream.clone());

        let schedule = client.student_schedule(11).await.unwrap();
        let day = schedule.get("01.09.2023").unwrap();
        let ids: Vec<_> = day.iter().map(|r| r.id).collect();
        assert_eq!(ids, [1, 2]);

        let again = client.student_schedule(11).await.unwrap();
        assert_eq!(schedule, again);
        assert_eq!(upstream.schedule_calls.load(Ordering::SeqCst), 1);

        let params = upstream.last_schedule.lock().unwrap().clone().unwrap();
        assert_eq!(
            params,
            vec![("who", "1".to_string()), ("group", "11".to_string())]
        );
    }

    #[tokio::test]
    async fn test_teacher_schedule_params() {
        let upstream = Arc::new(FakeUpstream::default());
        let (client, store) = client_with(upstream.clone());

        client.teacher_schedule(42).await.unwrap();
        let params = upstream.last_schedule.lock().unwrap().clone().unwrap();
        assert_eq!(
            params,
            vec![("who", "2".to_string()), ("prep", "42".to_string())]
        );
        assert!(store.exists("get_teacher_schedule:[42]").await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_schedule_ttl_shorter_than_reference_ttl() {
        let upstream = Arc::new(FakeUpstream::default());
        let (client, _) = client_with(upstream.clone());

        client.faculties().await.unwrap();
        client.student_schedule(11).await.unwrap();

        tokio::time::advance(Duration::from_secs(3601)).await;
        client.faculties().await.unwrap();
        client.student_schedule(11).await.unwrap();

        assert_eq!(upstream.list_calls.load(Ordering::SeqCst), 1);
        assert_eq!(upstream.schedule_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_transport_failure_propagates_uncached() {
        let upstream = Arc::new(FakeUpstream {
            fail: true,
            ..FakeUpstream::default()
        });
        let (client, store) = client_with(upstream);

        let err = client.courses(3).await.unwrap_err();
        assert!(err.is_transport());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_invalidate_forces_refetch() {
        let upstream = Arc::new(FakeUpstream::default());
        let (client, _) = client_with(upstream.clone());

        client.courses(5).await.unwrap();
        client.cache().invalidate(COURSES, &[5]).await.unwrap();
        client.courses(5).await.unwrap();

        assert_eq!(upstream.list_calls.load(Ordering::SeqCst), 2);
    }
}
