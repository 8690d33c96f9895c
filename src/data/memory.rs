//! In-memory [`Store`](super::Store) used by route tests. Data is lost on drop.
//!
//! One lock guards every table, so cascades are as atomic as the MongoDB
//! transactions they stand in for.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use uuid::Uuid;

use super::category::db::CategoryDb;
use super::category::Category;
use super::course::db::CourseDb;
use super::course::{Course, CourseChange, CourseScope, CourseStatus};
use super::enrollment::db::EnrollmentDb;
use super::enrollment::{Enrollment, LessonProgress};
use super::lesson::db::LessonDb;
use super::lesson::Lesson;
use super::module::db::ModuleDb;
use super::module::Module;
use super::review::db::ReviewDb;
use super::review::Review;
use super::user::db::UserDb;
use super::user::User;
use super::HealthDb;
use crate::error::StoreError;
use crate::middleware::paging::PageState;
use crate::role::Role;

#[derive(Debug, Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    categories: HashMap<Uuid, Category>,
    courses: HashMap<Uuid, Course>,
    modules: HashMap<Uuid, Module>,
    lessons: HashMap<Uuid, Lesson>,
    enrollments: HashMap<Uuid, Enrollment>,
    progress: HashMap<Uuid, LessonProgress>,
    reviews: HashMap<Uuid, Review>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        // a panicking test shouldn't poison the others
        self.tables.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn by_order<T, F: Fn(&T) -> (i32, chrono::DateTime<chrono::Utc>)>(mut items: Vec<T>, key: F) -> Vec<T> {
    items.sort_by_key(|it| key(it));
    items
}

#[rocket::async_trait]
impl HealthDb for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[rocket::async_trait]
impl UserDb for MemoryStore {
    async fn insert_user(&self, user: &User) -> Result<(), StoreError> {
        let mut tables = self.tables();
        if tables.users.values().any(|it| it.email == user.email) {
            return Err(StoreError::Duplicate("email"));
        }
        tables.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.tables().users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let email = email.to_lowercase();
        Ok(self
            .tables()
            .users
            .values()
            .find(|it| it.email == email)
            .cloned())
    }

    async fn list_users(&self, page: PageState) -> Result<Vec<User>, StoreError> {
        let mut users: Vec<User> = self.tables().users.values().cloned().collect();
        users.sort_by_key(|it| it.created_at);
        Ok(page.slice(users))
    }

    async fn update_user(&self, user: &User) -> Result<bool, StoreError> {
        let mut tables = self.tables();
        if tables
            .users
            .values()
            .any(|it| it.email == user.email && it.id != user.id)
        {
            return Err(StoreError::Duplicate("email"));
        }
        Ok(match tables.users.get_mut(&user.id) {
            Some(stored) => {
                stored.name = user.name.clone();
                stored.email = user.email.clone();
                stored.google_id = user.google_id.clone();
                true
            }
            None => false,
        })
    }

    async fn set_user_role(&self, id: Uuid, role: Role) -> Result<bool, StoreError> {
        Ok(match self.tables().users.get_mut(&id) {
            Some(stored) => {
                stored.role = role;
                true
            }
            None => false,
        })
    }

    async fn delete_user(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let mut tables = self.tables();
        tables.enrollments.retain(|_, it| it.user_id != id);
        tables.progress.retain(|_, it| it.user_id != id);
        tables.reviews.retain(|_, it| it.user_id != id);
        Ok(tables.users.remove(&id))
    }

    async fn count_courses_by_instructor(&self, instructor: Uuid) -> Result<u64, StoreError> {
        Ok(self
            .tables()
            .courses
            .values()
            .filter(|it| it.instructor_id == instructor)
            .count() as u64)
    }
}

#[rocket::async_trait]
impl CategoryDb for MemoryStore {
    async fn insert_category(&self, category: &Category) -> Result<(), StoreError> {
        let mut tables = self.tables();
        if tables.categories.values().any(|it| it.name == category.name) {
            return Err(StoreError::Duplicate("category name"));
        }
        tables.categories.insert(category.id, category.clone());
        Ok(())
    }

    async fn get_category(&self, id: Uuid) -> Result<Option<Category>, StoreError> {
        Ok(self.tables().categories.get(&id).cloned())
    }

    async fn list_categories(&self) -> Result<Vec<Category>, StoreError> {
        let mut categories: Vec<Category> = self.tables().categories.values().cloned().collect();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    async fn delete_category(&self, id: Uuid) -> Result<Option<Category>, StoreError> {
        Ok(self.tables().categories.remove(&id))
    }

    async fn count_courses_in_category(&self, id: Uuid) -> Result<u64, StoreError> {
        Ok(self
            .tables()
            .courses
            .values()
            .filter(|it| it.category_id == Some(id))
            .count() as u64)
    }
}

#[rocket::async_trait]
impl CourseDb for MemoryStore {
    async fn insert_course(&self, course: &Course) -> Result<(), StoreError> {
        self.tables().courses.insert(course.id, course.clone());
        Ok(())
    }

    async fn get_course(&self, id: Uuid) -> Result<Option<Course>, StoreError> {
        Ok(self.tables().courses.get(&id).cloned())
    }

    async fn list_courses(&self, scope: CourseScope, page: PageState) -> Result<Vec<Course>, StoreError> {
        let mut courses: Vec<Course> = self
            .tables()
            .courses
            .values()
            .filter(|it| scope.includes(it))
            .cloned()
            .collect();
        courses.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(page.slice(courses))
    }

    async fn get_courses(&self, ids: &[Uuid]) -> Result<Vec<Course>, StoreError> {
        let tables = self.tables();
        Ok(ids
            .iter()
            .filter_map(|id| tables.courses.get(id).cloned())
            .collect())
    }

    async fn update_course(
        &self,
        course: &Course,
        change: CourseChange,
        read_status: CourseStatus,
    ) -> Result<bool, StoreError> {
        Ok(match self.tables().courses.get_mut(&course.id) {
            Some(stored) if stored.status == read_status => {
                change.copy(course, stored);
                true
            }
            _ => false,
        })
    }

    async fn delete_course(&self, id: Uuid) -> Result<Option<Course>, StoreError> {
        let mut tables = self.tables();
        tables.progress.retain(|_, it| it.course_id != id);
        tables.lessons.retain(|_, it| it.course_id != id);
        tables.modules.retain(|_, it| it.course_id != id);
        tables.enrollments.retain(|_, it| it.course_id != id);
        tables.reviews.retain(|_, it| it.course_id != id);
        Ok(tables.courses.remove(&id))
    }
}

#[rocket::async_trait]
impl ModuleDb for MemoryStore {
    async fn insert_module(&self, module: &Module) -> Result<(), StoreError> {
        self.tables().modules.insert(module.id, module.clone());
        Ok(())
    }

    async fn get_module(&self, id: Uuid) -> Result<Option<Module>, StoreError> {
        Ok(self.tables().modules.get(&id).cloned())
    }

    async fn list_modules(&self, course_id: Uuid) -> Result<Vec<Module>, StoreError> {
        let modules = self
            .tables()
            .modules
            .values()
            .filter(|it| it.course_id == course_id)
            .cloned()
            .collect();
        Ok(by_order(modules, |it: &Module| (it.order, it.created_at)))
    }

    async fn next_module_order(&self, course_id: Uuid) -> Result<i32, StoreError> {
        Ok(self
            .tables()
            .modules
            .values()
            .filter(|it| it.course_id == course_id)
            .map(|it| it.order + 1)
            .max()
            .unwrap_or(1))
    }

    async fn update_module(&self, module: &Module) -> Result<bool, StoreError> {
        Ok(match self.tables().modules.get_mut(&module.id) {
            Some(stored) => {
                stored.title = module.title.clone();
                stored.description = module.description.clone();
                stored.order = module.order;
                true
            }
            None => false,
        })
    }

    async fn delete_module(&self, id: Uuid) -> Result<Option<Module>, StoreError> {
        let mut tables = self.tables();
        let lessons: Vec<Uuid> = tables
            .lessons
            .values()
            .filter(|it| it.module_id == id)
            .map(|it| it.id)
            .collect();
        tables.progress.retain(|_, it| !lessons.contains(&it.lesson_id));
        tables.lessons.retain(|_, it| it.module_id != id);
        Ok(tables.modules.remove(&id))
    }
}

#[rocket::async_trait]
impl LessonDb for MemoryStore {
    async fn insert_lesson(&self, lesson: &Lesson) -> Result<(), StoreError> {
        self.tables().lessons.insert(lesson.id, lesson.clone());
        Ok(())
    }

    async fn get_lesson(&self, id: Uuid) -> Result<Option<Lesson>, StoreError> {
        Ok(self.tables().lessons.get(&id).cloned())
    }

    async fn list_lessons(&self, module_id: Uuid) -> Result<Vec<Lesson>, StoreError> {
        let lessons = self
            .tables()
            .lessons
            .values()
            .filter(|it| it.module_id == module_id)
            .cloned()
            .collect();
        Ok(by_order(lessons, |it: &Lesson| (it.order, it.created_at)))
    }

    async fn list_course_lessons(&self, course_id: Uuid) -> Result<Vec<Lesson>, StoreError> {
        let lessons = self
            .tables()
            .lessons
            .values()
            .filter(|it| it.course_id == course_id)
            .cloned()
            .collect();
        Ok(by_order(lessons, |it: &Lesson| (it.order, it.created_at)))
    }

    async fn next_lesson_order(&self, module_id: Uuid) -> Result<i32, StoreError> {
        Ok(self
            .tables()
            .lessons
            .values()
            .filter(|it| it.module_id == module_id)
            .map(|it| it.order + 1)
            .max()
            .unwrap_or(1))
    }

    async fn update_lesson(&self, lesson: &Lesson) -> Result<bool, StoreError> {
        Ok(match self.tables().lessons.get_mut(&lesson.id) {
            Some(stored) => {
                stored.title = lesson.title.clone();
                stored.content_type = lesson.content_type;
                stored.content_url = lesson.content_url.clone();
                stored.description = lesson.description.clone();
                stored.duration = lesson.duration;
                stored.order = lesson.order;
                true
            }
            None => false,
        })
    }

    async fn delete_lesson(&self, id: Uuid) -> Result<Option<Lesson>, StoreError> {
        let mut tables = self.tables();
        tables.progress.retain(|_, it| it.lesson_id != id);
        Ok(tables.lessons.remove(&id))
    }
}

#[rocket::async_trait]
impl EnrollmentDb for MemoryStore {
    async fn insert_enrollment(&self, enrollment: &Enrollment) -> Result<(), StoreError> {
        let mut tables = self.tables();
        if tables
            .enrollments
            .values()
            .any(|it| it.user_id == enrollment.user_id && it.course_id == enrollment.course_id)
        {
            return Err(StoreError::Duplicate("enrollment"));
        }
        tables.enrollments.insert(enrollment.id, enrollment.clone());
        Ok(())
    }

    async fn find_enrollment(&self, user: Uuid, course: Uuid) -> Result<Option<Enrollment>, StoreError> {
        Ok(self
            .tables()
            .enrollments
            .values()
            .find(|it| it.user_id == user && it.course_id == course)
            .cloned())
    }

    async fn list_enrollments(&self, user: Uuid) -> Result<Vec<Enrollment>, StoreError> {
        let mut enrollments: Vec<Enrollment> = self
            .tables()
            .enrollments
            .values()
            .filter(|it| it.user_id == user)
            .cloned()
            .collect();
        enrollments.sort_by(|a, b| b.enrolled_at.cmp(&a.enrolled_at));
        Ok(enrollments)
    }

    async fn delete_enrollment(&self, user: Uuid, course: Uuid) -> Result<Option<Enrollment>, StoreError> {
        let mut tables = self.tables();
        tables
            .progress
            .retain(|_, it| !(it.user_id == user && it.course_id == course));

        let id = tables
            .enrollments
            .values()
            .find(|it| it.user_id == user && it.course_id == course)
            .map(|it| it.id);
        Ok(id.and_then(|id| tables.enrollments.remove(&id)))
    }

    async fn mark_lesson_complete(&self, progress: &LessonProgress) -> Result<LessonProgress, StoreError> {
        let mut tables = self.tables();
        let existing = tables
            .progress
            .values()
            .find(|it| it.user_id == progress.user_id && it.lesson_id == progress.lesson_id)
            .cloned();

        Ok(match existing {
            Some(existing) => existing,
            None => {
                tables.progress.insert(progress.id, progress.clone());
                progress.clone()
            }
        })
    }

    async fn completed_lessons(&self, user: Uuid, course: Uuid) -> Result<Vec<Uuid>, StoreError> {
        let mut progress: Vec<LessonProgress> = self
            .tables()
            .progress
            .values()
            .filter(|it| it.user_id == user && it.course_id == course)
            .cloned()
            .collect();
        progress.sort_by_key(|it| it.completed_at);
        Ok(progress.into_iter().map(|it| it.lesson_id).collect())
    }
}

#[rocket::async_trait]
impl ReviewDb for MemoryStore {
    async fn insert_review(&self, review: &Review) -> Result<(), StoreError> {
        let mut tables = self.tables();
        if tables
            .reviews
            .values()
            .any(|it| it.user_id == review.user_id && it.course_id == review.course_id)
        {
            return Err(StoreError::Duplicate("review"));
        }
        tables.reviews.insert(review.id, review.clone());
        Ok(())
    }

    async fn list_reviews(&self, course_id: Uuid) -> Result<Vec<Review>, StoreError> {
        let mut reviews: Vec<Review> = self
            .tables()
            .reviews
            .values()
            .filter(|it| it.course_id == course_id)
            .cloned()
            .collect();
        reviews.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(reviews)
    }
}
