use usergate_auth::Subject;

/// Who is calling, resolved once per request by the middleware.
///
/// Always present: requests without a usable bearer token carry the
/// anonymous subject.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SubjectContext {
    subject: Subject,
}

impl SubjectContext {
    pub fn new(subject: Subject) -> Self {
        Self { subject }
    }

    pub fn subject(&self) -> &Subject {
        &self.subject
    }
}
