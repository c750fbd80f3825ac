use tera::{Context, Tera};

const PAGE_TEMPLATE: &str = "page.html";

/// Server-rendered page shell around a rendered form or a notice.
#[derive(Debug, Default)]
pub struct Page<'a> {
    pub title: &'a str,
    /// Already-escaped HTML placed inside the shell as is.
    pub content: String,
    pub notice: Option<&'a str>,
    pub notice_kind: &'a str,
    pub embedded: bool,
}

pub struct Pages {
    tera: Tera,
}

impl Pages {
    pub fn new() -> Result<Self, tera::Error> {
        let mut tera = Tera::default();
        tera.add_raw_template(PAGE_TEMPLATE, include_str!("../templates/page.html"))?;
        Ok(Self { tera })
    }

    pub fn render(&self, page: &Page) -> Result<String, tera::Error> {
        let mut context = Context::new();
        context.insert("title", page.title);
        context.insert("content", &page.content);
        context.insert("notice", &page.notice);
        context.insert("notice_kind", page.notice_kind);
        context.insert("embedded", &page.embedded);
        self.tera.render(PAGE_TEMPLATE, &context)
    }
}
