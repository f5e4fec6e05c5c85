//! Salted password digests on an in-memory record.

use cryptattr::prelude::*;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("cryptattr Password Digest Example");
    println!("=================================\n");

    // Per-record salt generated into the `salt` attribute and embedded in the payload
    let attributes = EncryptedAttributes::new().with(
        EncryptedAttribute::builder("password")
            .digest(
                DigestOptions::new(DigestAlgorithm::Sha256)
                    .with_salt(SaltSpec::attribute("salt"))
                    .embed_salt(),
            )
            .on(Hook::BeforeSave)
            .build()?,
    )?;

    let mut user = MemoryRecord::new()
        .with_transient_attributes(attributes.transient_attributes())
        .with_salt_creator("salt", |record| {
            format!("{}:{}", record.text("login").unwrap_or_default(), std::process::id())
        });
    user.set_attribute("login", Some("alice".into()));
    user.set_attribute("password", Some("correct horse".into()));

    let outcomes = attributes.run_hook(Hook::BeforeSave, &mut user)?;
    println!("✓ Write hook: {outcomes:?}");

    user.commit();
    attributes.after_commit(&mut user);
    println!("✓ Stored payload: {}", user.stored_attribute("crypted_password").unwrap_or_default());

    // Load the record back and compare candidates
    let loaded = user.reload();
    if let Some(value) = attributes.read("password", &loaded)? {
        println!("✓ 'correct horse' matches: {}", value.equals_plaintext("correct horse")?);
        println!("✓ 'battery staple' matches: {}", value.equals_plaintext("battery staple")?);
    }

    Ok(())
}
