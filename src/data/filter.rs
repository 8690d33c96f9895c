use bson::spec::BinarySubtype;
use bson::{doc, Bson, Document};
use uuid::Uuid;

/// UUIDs are stored as binary subtype 4, see `bson::serde_helpers::uuid_1_as_binary`.
#[inline]
pub fn uuid(id: Uuid) -> Bson {
    Bson::Binary(bson::Binary {
        subtype: BinarySubtype::Uuid,
        bytes: id.as_bytes().to_vec(),
    })
}

#[inline]
pub fn by_id(id: Uuid) -> Document {
    doc! { "_id": uuid(id) }
}

#[inline]
pub fn by_ref(field: &str, id: Uuid) -> Document {
    doc! { field: uuid(id) }
}

#[inline]
pub fn by_ids(ids: &[Uuid]) -> Document {
    let ids: Vec<Bson> = ids.iter().copied().map(uuid).collect();
    doc! { "_id": { "$in": ids } }
}

#[inline]
pub fn by_refs(field: &str, ids: &[Uuid]) -> Document {
    let ids: Vec<Bson> = ids.iter().copied().map(uuid).collect();
    doc! { field: { "$in": ids } }
}

#[inline]
pub fn by_user_and_course(user: Uuid, course: Uuid) -> Document {
    doc! { "user_id": uuid(user), "course_id": uuid(course) }
}

#[inline]
pub fn by_email(email: &str) -> Document {
    doc! { "email": email.to_lowercase() }
}
