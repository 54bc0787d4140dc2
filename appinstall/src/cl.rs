//! CL command text used by the builder and by inference.

/// The job-scoped temporary library.
pub const QTEMP: &str = "QTEMP";

/// The load-and-run bootstrap program.
pub const BOOTSTRAP_PROGRAM: &str = "QINSTAPP";

/// Integrated file system path of a library.
pub fn library_path(library: &str) -> String {
    format!("/qsys.lib/{library}.lib")
}

fn save_file_member(name: &str) -> String {
    format!("/qsys.lib/qtemp.lib/{name}.file")
}

pub fn create_save_file(name: &str) -> String {
    format!("CRTSAVF {QTEMP}/{name}")
}

pub fn clear_save_file(name: &str) -> String {
    format!("CLRSAVF {QTEMP}/{name}")
}

pub fn save_library(library: &str) -> String {
    format!("SAVLIB LIB({library}) DEV(*SAVF) SAVF({QTEMP}/{library})")
}

/// Copy the save file `QTEMP/<member>` out to a stream file.
pub fn copy_to_stream_file(member: &str, stream_file: &str) -> String {
    format!(
        "CPYTOSTMF FROMMBR('{}') TOSTMF('{stream_file}') STMFOPT(*REPLACE) CVTDTA(*NONE) ENDLINFMT(*FIXED)",
        save_file_member(member)
    )
}

/// Copy a stream file into the save file `QTEMP/<member>`.
pub fn copy_from_stream_file(stream_file: &str, member: &str) -> String {
    format!(
        "CPYFRMSTMF FROMSTMF('{stream_file}') TOMBR('{}') MBROPT(*REPLACE) CVTDTA(*NONE) ENDLINFMT(*FIXED) TABEXPN(*NO)",
        save_file_member(member)
    )
}

pub fn delete_library(library: &str) -> String {
    format!("DLTLIB {library}")
}

/// Restore `savlib` from its save file as `rstlib`, optionally into a
/// specific storage pool.
pub fn restore_library(
    savlib: &str,
    rstlib: &str,
    rstasp: Option<&str>,
    rstaspdev: Option<&str>,
) -> String {
    let mut cmd = format!(
        "RSTLIB SAVLIB({savlib}) DEV(*SAVF) SAVF({QTEMP}/{savlib}) MBROPT(*ALL) ALWOBJDIF(*ALL) RSTLIB({rstlib})"
    );
    if let Some(asp) = rstasp {
        cmd.push_str(&format!(" RSTASP({asp})"));
    }
    if let Some(dev) = rstaspdev {
        cmd.push_str(&format!(" RSTASPDEV({dev})"));
    }
    cmd
}

pub fn save_program(program: &str, library: &str) -> String {
    format!("SAVOBJ OBJ({program}) OBJTYPE(*PGM) DEV(*SAVF) SAVF({QTEMP}/{program}) LIB({library})")
}

pub fn restore_program_to_qtemp(program: &str, savlib: &str) -> String {
    format!(
        "RSTOBJ OBJ({program}) OBJTYPE(*PGM) DEV(*SAVF) SAVF({QTEMP}/{program}) RSTLIB({QTEMP}) ALWOBJDIF(*ALL) MBROPT(*ALL) SAVLIB({savlib})"
    )
}

pub fn load_and_run() -> String {
    format!("LODRUN DEV(*SAVF) SAVF({QTEMP}/{BOOTSTRAP_PROGRAM})")
}

/// Local command that unpacks a stream archive over `/`.
pub fn untar(tar: &str, archive: &str) -> String {
    format!("{tar} xvf {archive} -C /")
}
