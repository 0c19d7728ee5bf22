mod basis;
mod dofmap;
mod io;
mod mesh;
