//! Shared SQL rendering for DDL statements.
//!
//! All statements the applier executes are produced here so the dialect
//! lives in one place. Foreign-key and auto-increment fields degrade to
//! their physical INTEGER column in column definitions; the constraint and
//! the AUTO_INCREMENT attribute are separate, ordered statements.

use crate::model::{FieldDescriptor, FieldKind, ReferentialAction};

/// Quote an identifier the MySQL way.
pub fn quote_ident(name: &str) -> String {
    format!("`{}`", name)
}

fn column_type(field: &FieldDescriptor) -> String {
    let base = match field.kind {
        FieldKind::Char => "VARCHAR",
        // FK and auto-increment columns are physically INT
        FieldKind::Int | FieldKind::ForeignKey | FieldKind::AutoIncrement => "INT",
    };
    if field.length > 0 {
        format!("{}({})", base, field.length)
    } else {
        base.to_string()
    }
}

/// Render one column definition: `` `name` TYPE [NOT] NULL ``.
pub fn field_fragment(field: &FieldDescriptor) -> String {
    format!(
        "{} {} {}",
        quote_ident(&field.name),
        column_type(field),
        if field.nullable { "NULL" } else { "NOT NULL" }
    )
}

pub fn create_table(table: &str, fields: &[&FieldDescriptor]) -> String {
    let columns = fields
        .iter()
        .map(|f| field_fragment(f))
        .collect::<Vec<_>>()
        .join(", ");
    format!("CREATE TABLE {} ({})", quote_ident(table), columns)
}

pub fn drop_table(table: &str) -> String {
    format!("DROP TABLE {}", quote_ident(table))
}

pub fn add_column(table: &str, field: &FieldDescriptor) -> String {
    format!(
        "ALTER TABLE {} ADD {}",
        quote_ident(table),
        field_fragment(field)
    )
}

/// `CHANGE` keeps the column name and rewrites its definition.
pub fn change_column(table: &str, field: &FieldDescriptor) -> String {
    format!(
        "ALTER TABLE {} CHANGE {} {}",
        quote_ident(table),
        quote_ident(&field.name),
        field_fragment(field)
    )
}

pub fn drop_column(table: &str, column: &str) -> String {
    format!(
        "ALTER TABLE {} DROP {}",
        quote_ident(table),
        quote_ident(column)
    )
}

/// Promote an INT column to the table's auto-increment primary key.
pub fn auto_increment_primary_key(table: &str, field: &FieldDescriptor) -> String {
    format!(
        "ALTER TABLE {} CHANGE {} {} AUTO_INCREMENT, ADD PRIMARY KEY ({})",
        quote_ident(table),
        quote_ident(&field.name),
        field_fragment(field),
        quote_ident(&field.name)
    )
}

/// Add the referential constraint for a foreign-key column. The referenced
/// column is always the target table's `id`.
pub fn add_foreign_key(
    table: &str,
    column: &str,
    target: &str,
    on_delete: ReferentialAction,
    on_update: ReferentialAction,
    relation_name: Option<&str>,
) -> String {
    let constraint = match relation_name {
        Some(name) => format!("ADD CONSTRAINT {} FOREIGN KEY", quote_ident(name)),
        None => "ADD FOREIGN KEY".to_string(),
    };
    format!(
        "ALTER TABLE {} {} ({}) REFERENCES {}(`id`) ON DELETE {} ON UPDATE {}",
        quote_ident(table),
        constraint,
        quote_ident(column),
        quote_ident(target),
        on_delete.sql(),
        on_update.sql()
    )
}

pub fn drop_foreign_key(table: &str, constraint: &str) -> String {
    format!(
        "ALTER TABLE {} DROP FOREIGN KEY {}",
        quote_ident(table),
        quote_ident(constraint)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(FieldDescriptor::int("age"), "`age` INT NOT NULL")]
    #[case(FieldDescriptor::int("age").length(3), "`age` INT(3) NOT NULL")]
    #[case(FieldDescriptor::char("name", 50), "`name` VARCHAR(50) NOT NULL")]
    #[case(
        FieldDescriptor::char("bio", 255).nullable(true),
        "`bio` VARCHAR(255) NULL"
    )]
    #[case(FieldDescriptor::foreign_key("author", "user"), "`author` INT NOT NULL")]
    #[case(FieldDescriptor::auto_increment("id"), "`id` INT NOT NULL")]
    fn test_field_fragment(#[case] field: FieldDescriptor, #[case] expected: &str) {
        assert_eq!(field_fragment(&field), expected);
    }

    #[test]
    fn test_create_table_degrades_foreign_keys() {
        let id = FieldDescriptor::auto_increment("id");
        let author = FieldDescriptor::foreign_key("author", "user");
        let sql = create_table("post", &[&id, &author]);

        assert_eq!(
            sql,
            "CREATE TABLE `post` (`id` INT NOT NULL, `author` INT NOT NULL)"
        );
        assert!(!sql.contains("FOREIGN KEY"));
        assert!(!sql.contains("AUTO_INCREMENT"));
    }

    #[test]
    fn test_auto_increment_primary_key() {
        let id = FieldDescriptor::auto_increment("id");
        assert_eq!(
            auto_increment_primary_key("user", &id),
            "ALTER TABLE `user` CHANGE `id` `id` INT NOT NULL AUTO_INCREMENT, ADD PRIMARY KEY (`id`)"
        );
    }

    #[test]
    fn test_add_foreign_key_spells_out_referential_actions() {
        let sql = add_foreign_key(
            "post",
            "author",
            "user",
            ReferentialAction::SetNull,
            ReferentialAction::NoAction,
            None,
        );
        assert_eq!(
            sql,
            "ALTER TABLE `post` ADD FOREIGN KEY (`author`) REFERENCES `user`(`id`) ON DELETE SET NULL ON UPDATE NO ACTION"
        );
    }

    #[test]
    fn test_add_foreign_key_with_named_constraint() {
        let sql = add_foreign_key(
            "post",
            "author",
            "user",
            ReferentialAction::Cascade,
            ReferentialAction::Restrict,
            Some("fk_post_author"),
        );
        assert!(sql.contains("ADD CONSTRAINT `fk_post_author` FOREIGN KEY (`author`)"));
    }

    #[test]
    fn test_change_and_drop_column() {
        let name = FieldDescriptor::char("name", 80).nullable(true);
        assert_eq!(
            change_column("user", &name),
            "ALTER TABLE `user` CHANGE `name` `name` VARCHAR(80) NULL"
        );
        assert_eq!(drop_column("user", "name"), "ALTER TABLE `user` DROP `name`");
        assert_eq!(drop_table("user"), "DROP TABLE `user`");
    }
}
