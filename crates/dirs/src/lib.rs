use directories::ProjectDirs;
use std::sync::OnceLock;

pub struct Dirs;

impl Dirs {
    /// Project directory specifically for Vim Pixtex.
    ///
    /// All the files created by vim-pixtex are stored there.
    pub fn project() -> &'static ProjectDirs {
        static CELL: OnceLock<ProjectDirs> = OnceLock::new();

        CELL.get_or_init(|| {
            ProjectDirs::from("org", "vim", "Pixtex")
                .expect("Couldn't create project directory for vim-pixtex")
        })
    }
}
