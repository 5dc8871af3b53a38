//! In-process store implementing every repository trait.
//!
//! Mirrors the constraints of the Postgres schema (unique keys, foreign keys,
//! cascades) so handlers behave the same against either backend.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Mutex, MutexGuard,
};

use anyhow::anyhow;
use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use super::StoreError;
use crate::{
    answers::{
        repo::AnswerRepo,
        repo_types::{Answer, AnswerFields},
    },
    auth::{
        claims::Role,
        repo::UserRepo,
        repo_types::{NewUser, User},
    },
    courses::{
        repo::CourseRepo,
        repo_types::{Course, CourseFields},
    },
    enrollments::{
        repo::{EnrollmentError, EnrollmentStore},
        repo_types::{Enrollment, EnrollmentWithCourse, EnrollmentWithUser, Student},
    },
    lessons::{
        repo::LessonRepo,
        repo_types::{Lesson, LessonFields},
    },
    profiles::{
        repo::ProfileRepo,
        repo_types::{Profile, ProfileFields},
    },
    quizzes::{
        repo::QuizRepo,
        repo_types::{Quiz, QuizFields},
    },
};

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    profiles: Vec<Profile>,
    courses: Vec<Course>,
    enrollments: Vec<Enrollment>,
    lessons: Vec<Lesson>,
    quizzes: Vec<Quiz>,
    answers: Vec<Answer>,
}

impl Tables {
    fn has_user(&self, id: Uuid) -> bool {
        self.users.iter().any(|u| u.id == id)
    }

    fn has_course(&self, id: Uuid) -> bool {
        self.courses.iter().any(|c| c.id == id)
    }
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    offline: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// While offline every call fails with `StoreError::Unavailable`.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>, StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(anyhow!("memory store is offline")));
        }
        self.tables
            .lock()
            .map_err(|_| StoreError::Unavailable(anyhow!("memory store lock poisoned")))
    }

    /// Inserts an account directly; the password hash is left blank.
    pub fn seed_user(&self, username: &str, role: Role) -> Uuid {
        let id = Uuid::new_v4();
        let mut t = self.tables.lock().unwrap_or_else(|e| e.into_inner());
        t.users.push(User {
            id,
            email: format!("{username}@example.com"),
            username: username.to_string(),
            password_hash: String::new(),
            role,
            created_at: OffsetDateTime::now_utc(),
            deleted_at: None,
        });
        id
    }

    /// Inserts an ownerless course directly.
    pub fn seed_course(&self, name: &str) -> Uuid {
        let id = Uuid::new_v4();
        let now = OffsetDateTime::now_utc();
        let mut t = self.tables.lock().unwrap_or_else(|e| e.into_inner());
        t.courses.push(Course {
            id,
            owner_id: None,
            name: name.to_string(),
            description: String::new(),
            price: 0.0,
            image: None,
            created_at: now,
            updated_at: now,
        });
        id
    }

    pub fn enrollment_count(&self, user_id: Uuid, course_id: Uuid) -> usize {
        let t = self.tables.lock().unwrap_or_else(|e| e.into_inner());
        t.enrollments
            .iter()
            .filter(|e| e.user_id == user_id && e.course_id == course_id)
            .count()
    }
}

#[async_trait]
impl UserRepo for MemoryStore {
    async fn create_user(&self, new: NewUser) -> Result<User, StoreError> {
        let mut t = self.tables()?;
        if t.users.iter().any(|u| u.email == new.email) {
            return Err(StoreError::Conflict("users_email_key".into()));
        }
        if t.users.iter().any(|u| u.username == new.username) {
            return Err(StoreError::Conflict("users_username_key".into()));
        }
        let user = User {
            id: Uuid::new_v4(),
            email: new.email,
            username: new.username,
            password_hash: new.password_hash,
            role: new.role,
            created_at: OffsetDateTime::now_utc(),
            deleted_at: None,
        };
        t.users.push(user.clone());
        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let t = self.tables()?;
        Ok(t.users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let t = self.tables()?;
        Ok(t.users.iter().find(|u| u.username == username).cloned())
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let t = self.tables()?;
        Ok(t.users.iter().find(|u| u.id == id).cloned())
    }

    async fn soft_delete_user(&self, id: Uuid) -> Result<(), StoreError> {
        let mut t = self.tables()?;
        let user = t
            .users
            .iter_mut()
            .find(|u| u.id == id && u.is_active())
            .ok_or(StoreError::NotFound)?;
        user.deleted_at = Some(OffsetDateTime::now_utc());
        Ok(())
    }
}

#[async_trait]
impl ProfileRepo for MemoryStore {
    async fn create_profile(
        &self,
        user_id: Uuid,
        fields: ProfileFields,
    ) -> Result<Profile, StoreError> {
        let mut t = self.tables()?;
        if !t.has_user(user_id) {
            return Err(StoreError::MissingReference);
        }
        if t.profiles.iter().any(|p| p.user_id == user_id) {
            return Err(StoreError::Conflict("profiles_user_id_key".into()));
        }
        let now = OffsetDateTime::now_utc();
        let profile = Profile {
            id: Uuid::new_v4(),
            user_id,
            first_name: fields.first_name,
            last_name: fields.last_name,
            phone: fields.phone,
            address: fields.address,
            avatar: fields.avatar,
            created_at: now,
            updated_at: now,
        };
        t.profiles.push(profile.clone());
        Ok(profile)
    }

    async fn find_profile(&self, user_id: Uuid) -> Result<Option<Profile>, StoreError> {
        let t = self.tables()?;
        Ok(t.profiles.iter().find(|p| p.user_id == user_id).cloned())
    }

    async fn update_profile(
        &self,
        user_id: Uuid,
        fields: ProfileFields,
    ) -> Result<Profile, StoreError> {
        let mut t = self.tables()?;
        let profile = t
            .profiles
            .iter_mut()
            .find(|p| p.user_id == user_id)
            .ok_or(StoreError::NotFound)?;
        profile.first_name = fields.first_name;
        profile.last_name = fields.last_name;
        profile.phone = fields.phone;
        profile.address = fields.address;
        profile.avatar = fields.avatar;
        profile.updated_at = OffsetDateTime::now_utc();
        Ok(profile.clone())
    }

    async fn delete_profile(&self, user_id: Uuid) -> Result<(), StoreError> {
        let mut t = self.tables()?;
        let before = t.profiles.len();
        t.profiles.retain(|p| p.user_id != user_id);
        if t.profiles.len() == before {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

#[async_trait]
impl CourseRepo for MemoryStore {
    async fn create_course(
        &self,
        owner_id: Uuid,
        fields: CourseFields,
    ) -> Result<Course, StoreError> {
        let mut t = self.tables()?;
        if !t.has_user(owner_id) {
            return Err(StoreError::MissingReference);
        }
        let now = OffsetDateTime::now_utc();
        let course = Course {
            id: Uuid::new_v4(),
            owner_id: Some(owner_id),
            name: fields.name,
            description: fields.description,
            price: fields.price,
            image: fields.image,
            created_at: now,
            updated_at: now,
        };
        t.courses.push(course.clone());
        Ok(course)
    }

    async fn list_courses(&self) -> Result<Vec<Course>, StoreError> {
        let t = self.tables()?;
        Ok(t.courses.clone())
    }

    async fn find_course(&self, id: Uuid) -> Result<Option<Course>, StoreError> {
        let t = self.tables()?;
        Ok(t.courses.iter().find(|c| c.id == id).cloned())
    }

    async fn update_course(&self, id: Uuid, fields: CourseFields) -> Result<Course, StoreError> {
        let mut t = self.tables()?;
        let course = t
            .courses
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(StoreError::NotFound)?;
        course.name = fields.name;
        course.description = fields.description;
        course.price = fields.price;
        course.image = fields.image;
        course.updated_at = OffsetDateTime::now_utc();
        Ok(course.clone())
    }

    async fn delete_course(&self, id: Uuid) -> Result<(), StoreError> {
        let mut t = self.tables()?;
        if !t.has_course(id) {
            return Err(StoreError::NotFound);
        }
        t.courses.retain(|c| c.id != id);
        t.enrollments.retain(|e| e.course_id != id);
        t.lessons.retain(|l| l.course_id != id);
        let dropped: Vec<Uuid> = t
            .quizzes
            .iter()
            .filter(|q| q.course_id == id)
            .map(|q| q.id)
            .collect();
        t.quizzes.retain(|q| q.course_id != id);
        t.answers.retain(|a| !dropped.contains(&a.quiz_id));
        Ok(())
    }
}

#[async_trait]
impl EnrollmentStore for MemoryStore {
    async fn exists(&self, user_id: Uuid, course_id: Uuid) -> Result<bool, StoreError> {
        let t = self.tables()?;
        Ok(t
            .enrollments
            .iter()
            .any(|e| e.user_id == user_id && e.course_id == course_id))
    }

    async fn create_enrollment(
        &self,
        user_id: Uuid,
        course_id: Uuid,
    ) -> Result<Enrollment, EnrollmentError> {
        let mut t = self.tables()?;
        if !t.has_user(user_id) || !t.has_course(course_id) {
            return Err(StoreError::MissingReference.into());
        }
        if t
            .enrollments
            .iter()
            .any(|e| e.user_id == user_id && e.course_id == course_id)
        {
            return Err(EnrollmentError::AlreadyEnrolled);
        }
        let enrollment = Enrollment {
            id: Uuid::new_v4(),
            user_id,
            course_id,
            created_at: OffsetDateTime::now_utc(),
        };
        t.enrollments.push(enrollment.clone());
        Ok(enrollment)
    }

    async fn delete_enrollment(
        &self,
        user_id: Uuid,
        course_id: Uuid,
    ) -> Result<(), EnrollmentError> {
        let mut t = self.tables()?;
        let before = t.enrollments.len();
        t.enrollments
            .retain(|e| !(e.user_id == user_id && e.course_id == course_id));
        if t.enrollments.len() == before {
            return Err(EnrollmentError::NotEnrolled);
        }
        Ok(())
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<EnrollmentWithCourse>, StoreError> {
        let t = self.tables()?;
        Ok(t
            .enrollments
            .iter()
            .filter(|e| e.user_id == user_id)
            .filter_map(|e| {
                let course = t.courses.iter().find(|c| c.id == e.course_id)?;
                Some(EnrollmentWithCourse {
                    enrollment: e.clone(),
                    course: course.clone(),
                })
            })
            .collect())
    }

    async fn list_for_course(
        &self,
        course_id: Uuid,
    ) -> Result<Vec<EnrollmentWithUser>, StoreError> {
        let t = self.tables()?;
        Ok(t
            .enrollments
            .iter()
            .filter(|e| e.course_id == course_id)
            .filter_map(|e| {
                let user = t
                    .users
                    .iter()
                    .find(|u| u.id == e.user_id && u.is_active())?;
                Some(EnrollmentWithUser {
                    enrollment: e.clone(),
                    student: Student {
                        user_id: user.id,
                        username: user.username.clone(),
                        email: user.email.clone(),
                    },
                })
            })
            .collect())
    }
}

#[async_trait]
impl LessonRepo for MemoryStore {
    async fn create_lesson(&self, fields: LessonFields) -> Result<Lesson, StoreError> {
        let mut t = self.tables()?;
        if !t.has_course(fields.course_id) {
            return Err(StoreError::MissingReference);
        }
        let now = OffsetDateTime::now_utc();
        let lesson = Lesson {
            id: Uuid::new_v4(),
            course_id: fields.course_id,
            name: fields.name,
            description: fields.description,
            video: fields.video,
            created_at: now,
            updated_at: now,
        };
        t.lessons.push(lesson.clone());
        Ok(lesson)
    }

    async fn find_lesson(&self, id: Uuid) -> Result<Option<Lesson>, StoreError> {
        let t = self.tables()?;
        Ok(t.lessons.iter().find(|l| l.id == id).cloned())
    }

    async fn list_lessons(&self, course_id: Uuid) -> Result<Vec<Lesson>, StoreError> {
        let t = self.tables()?;
        Ok(t
            .lessons
            .iter()
            .filter(|l| l.course_id == course_id)
            .cloned()
            .collect())
    }

    async fn update_lesson(&self, id: Uuid, fields: LessonFields) -> Result<Lesson, StoreError> {
        let mut t = self.tables()?;
        if !t.has_course(fields.course_id) {
            return Err(StoreError::MissingReference);
        }
        let lesson = t
            .lessons
            .iter_mut()
            .find(|l| l.id == id)
            .ok_or(StoreError::NotFound)?;
        lesson.course_id = fields.course_id;
        lesson.name = fields.name;
        lesson.description = fields.description;
        lesson.video = fields.video;
        lesson.updated_at = OffsetDateTime::now_utc();
        Ok(lesson.clone())
    }

    async fn delete_lesson(&self, id: Uuid) -> Result<(), StoreError> {
        let mut t = self.tables()?;
        let before = t.lessons.len();
        t.lessons.retain(|l| l.id != id);
        if t.lessons.len() == before {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

#[async_trait]
impl QuizRepo for MemoryStore {
    async fn create_quiz(&self, fields: QuizFields) -> Result<Quiz, StoreError> {
        let mut t = self.tables()?;
        if !t.has_course(fields.course_id) {
            return Err(StoreError::MissingReference);
        }
        let now = OffsetDateTime::now_utc();
        let quiz = Quiz {
            id: Uuid::new_v4(),
            course_id: fields.course_id,
            name: fields.name,
            description: fields.description,
            created_at: now,
            updated_at: now,
        };
        t.quizzes.push(quiz.clone());
        Ok(quiz)
    }

    async fn find_quiz(&self, id: Uuid) -> Result<Option<Quiz>, StoreError> {
        let t = self.tables()?;
        Ok(t.quizzes.iter().find(|q| q.id == id).cloned())
    }

    async fn list_quizzes(&self, course_id: Uuid) -> Result<Vec<Quiz>, StoreError> {
        let t = self.tables()?;
        Ok(t
            .quizzes
            .iter()
            .filter(|q| q.course_id == course_id)
            .cloned()
            .collect())
    }

    async fn update_quiz(&self, id: Uuid, fields: QuizFields) -> Result<Quiz, StoreError> {
        let mut t = self.tables()?;
        if !t.has_course(fields.course_id) {
            return Err(StoreError::MissingReference);
        }
        let quiz = t
            .quizzes
            .iter_mut()
            .find(|q| q.id == id)
            .ok_or(StoreError::NotFound)?;
        quiz.course_id = fields.course_id;
        quiz.name = fields.name;
        quiz.description = fields.description;
        quiz.updated_at = OffsetDateTime::now_utc();
        Ok(quiz.clone())
    }

    async fn delete_quiz(&self, id: Uuid) -> Result<(), StoreError> {
        let mut t = self.tables()?;
        let before = t.quizzes.len();
        t.quizzes.retain(|q| q.id != id);
        if t.quizzes.len() == before {
            return Err(StoreError::NotFound);
        }
        t.answers.retain(|a| a.quiz_id != id);
        Ok(())
    }
}

#[async_trait]
impl AnswerRepo for MemoryStore {
    async fn create_answer(&self, fields: AnswerFields) -> Result<Answer, StoreError> {
        let mut t = self.tables()?;
        if !t.quizzes.iter().any(|q| q.id == fields.quiz_id) {
            return Err(StoreError::MissingReference);
        }
        let now = OffsetDateTime::now_utc();
        let answer = Answer {
            id: Uuid::new_v4(),
            quiz_id: fields.quiz_id,
            content: fields.content,
            created_at: now,
            updated_at: now,
        };
        t.answers.push(answer.clone());
        Ok(answer)
    }

    async fn find_answer(&self, id: Uuid) -> Result<Option<Answer>, StoreError> {
        let t = self.tables()?;
        Ok(t.answers.iter().find(|a| a.id == id).cloned())
    }

    async fn list_answers(&self, quiz_id: Uuid) -> Result<Vec<Answer>, StoreError> {
        let t = self.tables()?;
        Ok(t
            .answers
            .iter()
            .filter(|a| a.quiz_id == quiz_id)
            .cloned()
            .collect())
    }

    async fn update_answer(&self, id: Uuid, fields: AnswerFields) -> Result<Answer, StoreError> {
        let mut t = self.tables()?;
        if !t.quizzes.iter().any(|q| q.id == fields.quiz_id) {
            return Err(StoreError::MissingReference);
        }
        let answer = t
            .answers
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or(StoreError::NotFound)?;
        answer.quiz_id = fields.quiz_id;
        answer.content = fields.content;
        answer.updated_at = OffsetDateTime::now_utc();
        Ok(answer.clone())
    }

    async fn delete_answer(&self, id: Uuid) -> Result<(), StoreError> {
        let mut t = self.tables()?;
        let before = t.answers.len();
        t.answers.retain(|a| a.id != id);
        if t.answers.len() == before {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}
